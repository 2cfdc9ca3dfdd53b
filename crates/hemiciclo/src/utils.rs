use std::collections::{BTreeMap, BTreeSet};

use crate::types::{EnrichedDeputy, GroupLink, GroupMembership, Substitution};

#[derive(Debug, Default)]
pub struct GroupFilter {
    /// Case-insensitive substring of the group name.
    pub name: Option<String>,
    pub limit: Option<usize>,
}

impl GroupFilter {
    pub fn apply(&self, mut links: Vec<GroupLink>) -> Vec<GroupLink> {
        if let Some(name) = &self.name {
            let needle = name.to_lowercase();
            links.retain(|l| l.name.to_lowercase().contains(&needle));
        }
        if let Some(lim) = self.limit {
            links.truncate(lim);
        }
        links
    }

    pub fn validate(self) -> Result<Self, String> {
        if self.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            return Err("Group name filter cannot be empty".to_string());
        }
        if self.limit.is_some_and(|l| l == 0) {
            return Err("Limit must be greater than 0".to_string());
        }
        Ok(self)
    }
}

#[derive(Debug)]
pub struct MembershipStats {
    /// Per group: (active members, members who left).
    pub groups: BTreeMap<String, (usize, usize)>,
    pub total: usize,
}

impl MembershipStats {
    pub fn from_memberships(rows: &[GroupMembership]) -> MembershipStats {
        let mut groups: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for row in rows {
            let entry = groups.entry(row.group_name.clone()).or_default();
            if row.is_active() {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
        MembershipStats {
            groups,
            total: rows.len(),
        }
    }
}

impl std::fmt::Display for MembershipStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        for (group, (active, left)) in &self.groups {
            writeln!(f, "  {}: {} active, {} left", group, active, left)?;
        }
        writeln!(f, "  Total rows: {}", self.total)
    }
}

#[derive(Debug)]
pub struct DeputyStats {
    pub deputies: usize,
    pub provinces: usize,
    pub with_substitution: usize,
}

impl DeputyStats {
    pub fn from_deputies(rows: &[EnrichedDeputy]) -> DeputyStats {
        DeputyStats {
            deputies: rows.len(),
            provinces: rows
                .iter()
                .map(|d| d.province.as_str())
                .filter(|p| !p.is_empty())
                .collect::<BTreeSet<_>>()
                .len(),
            with_substitution: rows
                .iter()
                .filter(|d| !d.substitutes.is_empty() || !d.substituted_by.is_empty())
                .count(),
        }
    }
}

impl std::fmt::Display for DeputyStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Deputies:            {}", self.deputies)?;
        writeln!(f, "  Constituencies:      {}", self.provinces)?;
        writeln!(f, "  In a substitution:   {}", self.with_substitution)
    }
}

#[derive(Debug)]
pub struct SubstitutionStats {
    pub total: usize,
    pub ongoing: usize,
}

impl SubstitutionStats {
    pub fn from_substitutions(rows: &[Substitution]) -> SubstitutionStats {
        SubstitutionStats {
            total: rows.len(),
            ongoing: rows.iter().filter(|s| s.end_date.trim().is_empty()).count(),
        }
    }
}

impl std::fmt::Display for SubstitutionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nStatistics:")?;
        writeln!(f, "  Substitutions:  {}", self.total)?;
        writeln!(f, "  Ongoing:        {}", self.ongoing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Legislature;

    fn link(name: &str) -> GroupLink {
        GroupLink {
            name: name.into(),
            url: format!("https://www.congreso.es/grupos/{}", name.len()),
        }
    }

    #[test]
    fn test_group_filter() {
        let links = vec![
            link("Grupo Parlamentario Popular en el Congreso"),
            link("Grupo Parlamentario Socialista"),
            link("Grupo Parlamentario Mixto"),
        ];

        let filter = GroupFilter {
            name: Some("mixto".into()),
            limit: None,
        };
        let kept = filter.apply(links.clone());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "Grupo Parlamentario Mixto");

        let limited = GroupFilter {
            name: None,
            limit: Some(2),
        }
        .apply(links);
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_group_filter_validation() {
        assert!(
            GroupFilter {
                name: Some(" ".into()),
                limit: None
            }
            .validate()
            .is_err()
        );
        assert!(
            GroupFilter {
                name: None,
                limit: Some(0)
            }
            .validate()
            .is_err()
        );
        assert!(GroupFilter::default().validate().is_ok());
    }

    #[test]
    fn test_membership_stats() {
        let row = |group: &str, leave: &str| GroupMembership {
            member_name: "Pérez Gómez, Ana".into(),
            group_name: group.into(),
            join_date: "17/08/2023".into(),
            leave_date: leave.into(),
            legislature: Legislature::default(),
        };
        let stats = MembershipStats::from_memberships(&[
            row("Grupo Parlamentario Mixto", ""),
            row("Grupo Parlamentario Mixto", "01/02/2024"),
            row("Grupo Parlamentario Vasco (EAJ-PNV)", ""),
        ]);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.groups["Grupo Parlamentario Mixto"], (1, 1));
        assert!(stats.to_string().contains("Grupo Parlamentario Vasco (EAJ-PNV): 1 active, 0 left"));
    }
}
