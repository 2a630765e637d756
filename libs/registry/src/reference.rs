//! Image references in `{repository}/{image}:{tag}` form.

use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

/// Repository used for single-segment Docker Hub names (`nginx:1.25`).
const DEFAULT_REPOSITORY: &str = "library";

/// A registry namespace, image name and tag.
///
/// Components are opaque; the only validation is that none is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    repository: String,
    image: String,
    tag: String,
}

impl ImageRef {
    /// Create a reference from its parts.
    pub fn new(
        repository: impl Into<String>,
        image: impl Into<String>,
        tag: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        let reference = Self {
            repository: repository.into(),
            image: image.into(),
            tag: tag.into(),
        };

        for (component, value) in [
            ("repository", &reference.repository),
            ("image", &reference.image),
            ("tag", &reference.tag),
        ] {
            if value.is_empty() {
                return Err(RegistryError::InvalidReference(format!(
                    "{component} cannot be empty"
                )));
            }
        }

        Ok(reference)
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl FromStr for ImageRef {
    type Err = RegistryError;

    /// Parse `repository/image:tag`.
    ///
    /// The last `/` separates repository from image, so nested repositories
    /// (`org/team/app:v1`) keep their full path. A bare name maps to the
    /// `library` repository. The tag is mandatory.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, tag) = match s.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => (name, tag),
            _ => {
                return Err(RegistryError::InvalidReference(format!(
                    "missing tag in '{s}'"
                )))
            }
        };

        match name.rsplit_once('/') {
            Some((repository, image)) => Self::new(repository, image, tag),
            None => Self::new(DEFAULT_REPOSITORY, name, tag),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.repository, self.image, self.tag)
    }
}
