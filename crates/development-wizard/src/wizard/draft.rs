use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::phase::WizardPhase;

/// How the development relates to existing stock on the site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NatureOfDevelopment {
    #[default]
    New,
    Phase,
    Extension,
}

impl NatureOfDevelopment {
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "New Development",
            Self::Phase => "New Phase",
            Self::Extension => "Extension",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevelopmentType {
    Residential,
    Commercial,
    MixedUse,
    Land,
    Industrial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipType {
    Freehold,
    SectionalTitle,
    Leasehold,
    ShareBlock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevelopmentStatus {
    Planning,
    UnderConstruction,
    Launching,
    Selling,
    Completed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub city: String,
    pub province: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Image,
    Video,
}

/// Identifier assigned by the store when media is added. Unique within a draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub String);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: MediaId,
    /// Opaque handle to the uploaded file, owned by the upload collaborator.
    pub file_handle: Option<String>,
    /// Local preview or remote URL.
    pub url: String,
    pub media_type: MediaType,
    pub category: String,
    pub is_primary: bool,
}

/// Upload as handed to [`WizardStateStore::add_media`](super::WizardStateStore::add_media),
/// before an id has been assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMedia {
    #[serde(default)]
    pub file_handle: Option<String>,
    pub url: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub category: String,
    /// Requests the hero slot. Honoured only while the slot is empty.
    #[serde(default)]
    pub as_hero: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaSet {
    pub hero_image: Option<MediaItem>,
    pub photos: Vec<MediaItem>,
}

impl MediaSet {
    pub fn is_empty(&self) -> bool {
        self.hero_image.is_none() && self.photos.is_empty()
    }

    /// Hero first, then photos in upload order.
    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.hero_image.iter().chain(self.photos.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MediaItem> {
        self.hero_image.iter_mut().chain(self.photos.iter_mut())
    }

    pub fn get(&self, id: &MediaId) -> Option<&MediaItem> {
        self.iter().find(|item| &item.id == id)
    }

    pub fn primary(&self) -> Option<&MediaItem> {
        self.iter().find(|item| item.is_primary)
    }

    pub fn len(&self) -> usize {
        self.photos.len() + usize::from(self.hero_image.is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevelopmentIdentity {
    pub name: String,
    pub nature: NatureOfDevelopment,
    pub location: Location,
    pub media: MediaSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub development_type: Option<DevelopmentType>,
    pub ownership: Option<OwnershipType>,
    pub status: Option<DevelopmentStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub description: String,
    pub highlights: Vec<String>,
    pub amenities: Vec<String>,
    pub total_units: Option<u32>,
    pub expected_completion: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitTypeId(pub String);

impl fmt::Display for UnitTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub name: String,
    pub bedrooms: u8,
    pub bathrooms: f32,
    pub floor_size_m2: Option<u32>,
    pub price_from: u64,
    pub price_to: Option<u64>,
    pub available_units: u32,
}

/// Unit type as captured by the form, before the store assigns an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitTypeInput {
    pub name: String,
    #[serde(default)]
    pub bedrooms: u8,
    #[serde(default)]
    pub bathrooms: f32,
    #[serde(default)]
    pub floor_size_m2: Option<u32>,
    #[serde(default)]
    pub price_from: u64,
    #[serde(default)]
    pub price_to: Option<u64>,
    #[serde(default)]
    pub available_units: u32,
}

impl UnitTypeInput {
    pub(crate) fn into_unit_type(self, id: UnitTypeId) -> UnitType {
        UnitType {
            id,
            name: self.name,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            floor_size_m2: self.floor_size_m2,
            price_from: self.price_from,
            price_to: self.price_to,
            available_units: self.available_units,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finalisation {
    pub contact_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub marketing_headline: Option<String>,
    pub terms_accepted: bool,
}

/// The in-progress development listing built up across the wizard phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardDraft {
    pub identity: DevelopmentIdentity,
    pub classification: Classification,
    pub overview: Overview,
    pub unit_types: Vec<UnitType>,
    pub finalisation: Finalisation,
    pub current_phase: WizardPhase,
    pub is_published: bool,
}

impl Default for WizardDraft {
    fn default() -> Self {
        Self {
            identity: DevelopmentIdentity::default(),
            classification: Classification::default(),
            overview: Overview::default(),
            unit_types: Vec::new(),
            finalisation: Finalisation::default(),
            current_phase: WizardPhase::FIRST,
            is_published: false,
        }
    }
}

impl WizardDraft {
    pub fn media(&self) -> &MediaSet {
        &self.identity.media
    }

    pub fn unit_type(&self, id: &UnitTypeId) -> Option<&UnitType> {
        self.unit_types.iter().find(|unit| &unit.id == id)
    }
}

/// Read-only copy of the draft handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    /// Store revision the snapshot was taken at. Later snapshots carry larger values.
    pub revision: u64,
    pub draft: WizardDraft,
}

/// Shallow-merge updates for each phase record: `Some` replaces, `None` keeps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityPatch {
    pub name: Option<String>,
    pub nature: Option<NatureOfDevelopment>,
    pub location: Option<Location>,
}

impl IdentityPatch {
    pub(crate) fn apply(self, identity: &mut DevelopmentIdentity) {
        if let Some(name) = self.name {
            identity.name = name;
        }
        if let Some(nature) = self.nature {
            identity.nature = nature;
        }
        if let Some(location) = self.location {
            identity.location = location;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationPatch {
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationPatch {
    pub(crate) fn apply(self, location: &mut Location) {
        if let Some(address) = self.address {
            location.address = address;
        }
        if let Some(city) = self.city {
            location.city = city;
        }
        if let Some(province) = self.province {
            location.province = province;
        }
        if self.latitude.is_some() {
            location.latitude = self.latitude;
        }
        if self.longitude.is_some() {
            location.longitude = self.longitude;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationPatch {
    pub development_type: Option<DevelopmentType>,
    pub ownership: Option<OwnershipType>,
    pub status: Option<DevelopmentStatus>,
}

impl ClassificationPatch {
    pub(crate) fn apply(self, classification: &mut Classification) {
        if self.development_type.is_some() {
            classification.development_type = self.development_type;
        }
        if self.ownership.is_some() {
            classification.ownership = self.ownership;
        }
        if self.status.is_some() {
            classification.status = self.status;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewPatch {
    pub description: Option<String>,
    pub highlights: Option<Vec<String>>,
    pub amenities: Option<Vec<String>>,
    pub total_units: Option<u32>,
    pub expected_completion: Option<NaiveDate>,
}

impl OverviewPatch {
    pub(crate) fn apply(self, overview: &mut Overview) {
        if let Some(description) = self.description {
            overview.description = description;
        }
        if let Some(highlights) = self.highlights {
            overview.highlights = highlights;
        }
        if let Some(amenities) = self.amenities {
            overview.amenities = amenities;
        }
        if self.total_units.is_some() {
            overview.total_units = self.total_units;
        }
        if self.expected_completion.is_some() {
            overview.expected_completion = self.expected_completion;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitTypePatch {
    pub name: Option<String>,
    pub bedrooms: Option<u8>,
    pub bathrooms: Option<f32>,
    pub floor_size_m2: Option<u32>,
    pub price_from: Option<u64>,
    pub price_to: Option<u64>,
    pub available_units: Option<u32>,
}

impl UnitTypePatch {
    pub(crate) fn apply(self, unit: &mut UnitType) {
        if let Some(name) = self.name {
            unit.name = name;
        }
        if let Some(bedrooms) = self.bedrooms {
            unit.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = self.bathrooms {
            unit.bathrooms = bathrooms;
        }
        if self.floor_size_m2.is_some() {
            unit.floor_size_m2 = self.floor_size_m2;
        }
        if let Some(price_from) = self.price_from {
            unit.price_from = price_from;
        }
        if self.price_to.is_some() {
            unit.price_to = self.price_to;
        }
        if let Some(available_units) = self.available_units {
            unit.available_units = available_units;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalisationPatch {
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub marketing_headline: Option<String>,
    pub terms_accepted: Option<bool>,
}

impl FinalisationPatch {
    pub(crate) fn apply(self, finalisation: &mut Finalisation) {
        if let Some(contact_name) = self.contact_name {
            finalisation.contact_name = contact_name;
        }
        if let Some(contact_email) = self.contact_email {
            finalisation.contact_email = contact_email;
        }
        if self.contact_phone.is_some() {
            finalisation.contact_phone = self.contact_phone;
        }
        if self.marketing_headline.is_some() {
            finalisation.marketing_headline = self.marketing_headline;
        }
        if let Some(terms_accepted) = self.terms_accepted {
            finalisation.terms_accepted = terms_accepted;
        }
    }
}
