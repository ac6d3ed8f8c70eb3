use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::errors::UsageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMethodType {
    PointSprite,
    PointBlend,
    Mesh,
}

impl RenderMethodType {
    pub const ALL: [RenderMethodType; 3] = [
        RenderMethodType::PointSprite,
        RenderMethodType::PointBlend,
        RenderMethodType::Mesh,
    ];

    pub const DEFAULT: RenderMethodType = RenderMethodType::PointBlend;

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderMethodType::PointSprite => "PointSprite",
            RenderMethodType::PointBlend => "PointBlend",
            RenderMethodType::Mesh => "Mesh",
        }
    }
}

impl Display for RenderMethodType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMethodType {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RenderMethodType::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s)
            .ok_or_else(|| UsageError::UnknownRenderMethodType(s.to_string()))
    }
}

/// How actors using it are drawn. Subroutines are shader variants enabled on top of the base type.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMethod {
    pub method_type: RenderMethodType,
    pub subroutines: Vec<String>,
}

impl RenderMethod {
    pub fn new(method_type: RenderMethodType) -> Self {
        Self {
            method_type,
            subroutines: Vec::new(),
        }
    }

    /// Replaces the enabled subroutines. Duplicates and empty names are dropped, order is kept.
    pub fn set_subroutines<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.subroutines.clear();
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() && !self.subroutines.iter().any(|existing| existing == name) {
                self.subroutines.push(name.to_string());
            }
        }
    }

    /// Like `set_subroutines`, with the names separated by whitespace, commas or semicolons.
    pub fn set_subroutines_from_source(&mut self, source: &str) {
        self.set_subroutines(source.split(|c: char| c.is_whitespace() || c == ',' || c == ';'));
    }
}
