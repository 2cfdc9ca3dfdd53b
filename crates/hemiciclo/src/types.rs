use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("Invalid legislature '{0}'. Expected a term number such as '15'")]
pub struct LegislatureParseError(String);

/// A numbered parliamentary term, e.g. the XV legislature is `15`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Legislature(String);

impl Legislature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Legislature {
    fn default() -> Self {
        Legislature("15".to_string())
    }
}

impl FromStr for Legislature {
    type Err = LegislatureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
            let digits = trimmed.trim_start_matches('0');
            Ok(Legislature(
                if digits.is_empty() { "0" } else { digits }.to_string(),
            ))
        } else {
            Err(LegislatureParseError(s.to_string()))
        }
    }
}

impl Display for Legislature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A plenary session transcript ("Diario de Sesiones") found in the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlenaryDocument {
    /// Code as shown in the listing, e.g. `DSCD-15-PL-12`.
    pub code: String,
    /// Filesystem-safe key the stored file is named after.
    pub identifier: String,
    pub source_url: String,
    pub already_downloaded: bool,
}

impl Display for PlenaryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identifier)?;
        if self.already_downloaded {
            write!(f, " (already stored)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deputy {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "grupo_actual")]
    pub current_group: String,
    #[serde(rename = "provincia")]
    pub province: String,
    #[serde(rename = "legislatura")]
    pub legislature: Legislature,
}

impl Display for Deputy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} ({})", self.name, self.current_group, self.province)
    }
}

/// One join/leave episode of a deputy in a parliamentary group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    #[serde(rename = "nombre")]
    pub member_name: String,
    #[serde(rename = "grupo_parlamentario")]
    pub group_name: String,
    #[serde(rename = "fecha_alta")]
    pub join_date: String,
    /// Blank while the membership is still active.
    #[serde(rename = "fecha_baja")]
    pub leave_date: String,
    #[serde(rename = "legislatura")]
    pub legislature: Legislature,
}

impl GroupMembership {
    pub fn is_active(&self) -> bool {
        self.leave_date.trim().is_empty()
    }
}

impl Display for GroupMembership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {} → {}",
            self.member_name,
            self.group_name,
            self.join_date,
            if self.is_active() { "…" } else { &self.leave_date }
        )
    }
}

/// A row of the substitutions listing: `name` holds the seat between the two
/// dates, standing in for `substitutes` and/or replaced by `substituted_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "fecha_alta")]
    pub start_date: String,
    #[serde(rename = "fecha_baja")]
    pub end_date: String,
    #[serde(rename = "sustituye_a")]
    pub substitutes: String,
    #[serde(rename = "sustituido_por")]
    pub substituted_by: String,
    #[serde(rename = "legislatura")]
    pub legislature: Legislature,
}

/// A deputy joined with (at most) one of their substitution episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedDeputy {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "grupo_actual", default)]
    pub current_group: String,
    #[serde(rename = "provincia")]
    pub province: String,
    #[serde(rename = "sustituye_a")]
    pub substitutes: String,
    #[serde(rename = "sustituido_por", default)]
    pub substituted_by: String,
    #[serde(rename = "fecha_alta_suplencia")]
    pub substitution_start: String,
    #[serde(rename = "fecha_baja_suplencia")]
    pub substitution_end: String,
    #[serde(rename = "legislatura")]
    pub legislature: Legislature,
}

impl Display for EnrichedDeputy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.province)?;
        if !self.substitutes.is_empty() {
            write!(
                f,
                " sustituye a {} {} → {}",
                self.substitutes, self.substitution_start, self.substitution_end
            )?;
        }
        Ok(())
    }
}

/// A link to one group's composition page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLink {
    pub name: String,
    pub url: String,
}
