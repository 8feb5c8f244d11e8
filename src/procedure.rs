use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SedError;

/// The age-depth modeling procedures known to this pipeline, plus the
/// pseudo-procedure that stands in for collapsed sub-variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Procedure {
    Undatable,
    Bchron,
    Hamstr,
    Bacon,
    OxCal,
    Clam,
    /// Synthetic procedure produced by averaging sub-variant ensembles.
    Combined,
}

impl Procedure {
    pub fn parse(name: &str) -> Result<Self, SedError> {
        match name {
            "Undatable" => Ok(Self::Undatable),
            "Bchron" => Ok(Self::Bchron),
            "hamstr" => Ok(Self::Hamstr),
            "Bacon" => Ok(Self::Bacon),
            "OxCal" => Ok(Self::OxCal),
            "clam" => Ok(Self::Clam),
            "combined" => Ok(Self::Combined),
            other => Err(SedError::UnknownProcedure(other.to_string())),
        }
    }

    /// Name as it appears in the `model_name` column of output tables.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Undatable => "Undatable",
            Self::Bchron => "Bchron",
            Self::Hamstr => "hamstr",
            Self::Bacon => "Bacon",
            Self::OxCal => "OxCal",
            Self::Clam => "clam",
            Self::Combined => "combined",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A procedure together with an optional sub-variant label.
///
/// Some procedures emit several parameterizations for the same core (e.g. a
/// smoothing/type setting); the label distinguishes them until they are
/// collapsed into [`Procedure::Combined`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelTag {
    pub procedure: Procedure,
    pub variant: Option<String>,
}

impl ModelTag {
    pub fn new(procedure: Procedure) -> Self {
        Self {
            procedure,
            variant: None,
        }
    }

    pub fn with_variant(procedure: Procedure, variant: impl Into<String>) -> Self {
        Self {
            procedure,
            variant: Some(variant.into()),
        }
    }

    /// `model_name` column value: the procedure name, qualified by the
    /// sub-variant label when one is present.
    pub fn model_name(&self) -> String {
        match &self.variant {
            Some(variant) => format!("{} {variant}", self.procedure),
            None => self.procedure.name().to_string(),
        }
    }
}

impl fmt::Display for ModelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.model_name())
    }
}
