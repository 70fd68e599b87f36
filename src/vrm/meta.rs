use crate::vrm::schema::{Meta0, Meta1};

/// Which VRM major version a model was authored against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaVersion {
    /// VRM 0.x: faces -Z, `VRM` extension.
    V0,
    /// VRM 1.0: faces +Z, `VRMC_vrm` extension.
    V1,
}

/// Model information and license summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrmMeta {
    pub meta_version: MetaVersion,
    pub name: String,
    pub version: Option<String>,
    pub authors: Vec<String>,
    pub contact_information: Option<String>,
    pub references: Vec<String>,
    pub license_url: Option<String>,
}

impl VrmMeta {
    #[must_use]
    pub fn empty(meta_version: MetaVersion) -> Self {
        Self {
            meta_version,
            name: String::new(),
            version: None,
            authors: Vec::new(),
            contact_information: None,
            references: Vec::new(),
            license_url: None,
        }
    }
}

impl From<Meta1> for VrmMeta {
    fn from(meta: Meta1) -> Self {
        Self {
            meta_version: MetaVersion::V1,
            name: meta.name,
            version: meta.version,
            authors: meta.authors,
            contact_information: meta.contact_information,
            references: meta.references,
            license_url: Some(meta.license_url).filter(|url| !url.is_empty()),
        }
    }
}

impl From<Meta0> for VrmMeta {
    fn from(meta: Meta0) -> Self {
        Self {
            meta_version: MetaVersion::V0,
            name: meta.title.unwrap_or_default(),
            version: meta.version,
            authors: meta.author.into_iter().collect(),
            contact_information: meta.contact_information,
            references: meta.reference.into_iter().collect(),
            license_url: meta.other_license_url.or(meta.license_name),
        }
    }
}
