use std::collections::HashMap;

use crate::types::{Deputy, EnrichedDeputy, Substitution};

/// Left-joins deputies with substitution episodes on the deputy name.
///
/// Every deputy yields exactly one row, in input order. When a name has
/// several episodes only the first one is kept; the rest are logged at
/// debug level. Deputies without an episode get empty substitution columns.
pub fn enrich(deputies: &[Deputy], substitutions: &[Substitution]) -> Vec<EnrichedDeputy> {
    let mut episodes: HashMap<&str, &Substitution> = HashMap::new();
    for substitution in substitutions {
        let name = substitution.name.trim();
        if episodes.contains_key(name) {
            log::debug!(
                "Ignoring extra substitution episode for {} ({} – {})",
                name,
                substitution.start_date,
                substitution.end_date
            );
            continue;
        }
        episodes.insert(name, substitution);
    }

    deputies
        .iter()
        .map(|deputy| {
            let (substitutes, substituted_by, substitution_start, substitution_end) =
                match episodes.get(deputy.name.trim()) {
                    Some(s) => (
                        s.substitutes.clone(),
                        s.substituted_by.clone(),
                        s.start_date.clone(),
                        s.end_date.clone(),
                    ),
                    None => Default::default(),
                };
            EnrichedDeputy {
                name: deputy.name.clone(),
                current_group: deputy.current_group.clone(),
                province: deputy.province.clone(),
                substitutes,
                substituted_by,
                substitution_start,
                substitution_end,
                legislature: deputy.legislature.clone(),
            }
        })
        .collect()
}
