use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use embarque_core::booking::{Booking, BookingCore, Leg, LuggageSummary};

/// Label of the single top-level bucket in default mode.
pub const DEFAULT_BUCKET_LABEL: &str = "ALL";
/// Canonical label for a blank or "general" neighborhood.
pub const GENERAL_LABEL: &str = "GENERAL";
/// Fallback bucket for bookings missing an address in the grouped dimension.
pub const NO_CITY_LABEL: &str = "NO CITY";
pub const NO_DRIVER_LABEL: &str = "NO DRIVER";
pub const NO_BROKER_LABEL: &str = "NO BROKER";

/// How the flat booking list is organized into a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizeMode {
    Default,
    City,
    Driver,
    Broker,
}

/// Which leg's address feeds the city grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CityGroupBy {
    Pickup,
    Delivery,
}

impl CityGroupBy {
    pub fn leg(self) -> Leg {
        match self {
            CityGroupBy::Pickup => Leg::Pickup,
            CityGroupBy::Delivery => Leg::Delivery,
        }
    }
}

/// One manifest line: the booking snapshot plus its luggage rollup.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub booking: Booking,
    pub luggage: LuggageSummary,
}

/// Bookings sharing a group identifier inside one sub-bucket. Ungrouped
/// bookings appear as singleton groups so the tree shape is uniform.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedGroup {
    pub group_id: Option<Uuid>,
    pub tag_color: Option<String>,
    pub entries: Vec<ManifestEntry>,
}

impl LinkedGroup {
    pub fn is_linked(&self) -> bool {
        self.group_id.is_some() && self.entries.len() > 1
    }

    pub fn booking_ids(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.booking.id()).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubBucket {
    pub label: String,
    pub groups: Vec<LinkedGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bucket {
    pub label: String,
    pub sub_buckets: Vec<SubBucket>,
}

/// The derived manifest tree. Never the source of truth for order; it only
/// reflects the order indices carried by the bookings it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct Hierarchy {
    pub mode: OrganizeMode,
    pub city_group_by: Option<CityGroupBy>,
    pub buckets: Vec<Bucket>,
}

impl Hierarchy {
    /// Booking ids in display order, flattened across the whole tree.
    pub fn flat_ids(&self) -> Vec<i64> {
        self.groups().flat_map(|g| g.booking_ids()).collect()
    }

    /// Display-ordered groups as atomic reorder units.
    pub fn group_units(&self) -> Vec<Vec<i64>> {
        self.groups().map(|g| g.booking_ids()).collect()
    }

    fn groups(&self) -> impl Iterator<Item = &LinkedGroup> {
        self.buckets
            .iter()
            .flat_map(|b| b.sub_buckets.iter())
            .flat_map(|s| s.groups.iter())
    }
}

/// Uppercase a label and strip Latin accents so "São Paulo", "SAO PAULO" and
/// "sao paulo" collate and bucket together.
pub(crate) fn fold_label(raw: &str) -> String {
    raw.trim()
        .chars()
        .flat_map(|c| c.to_uppercase())
        .map(|c| match c {
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'Ç' => 'C',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Sort key for a group inside a sub-bucket: the smallest member key wins,
/// with manual order as tiebreaker.
fn group_sort_key(group: &LinkedGroup, key: impl Fn(&BookingCore) -> i64) -> (i64, i64) {
    let primary = group
        .entries
        .iter()
        .map(|e| key(e.booking.core()))
        .min()
        .unwrap_or(i64::MAX);
    let manual = group
        .entries
        .iter()
        .map(|e| e.booking.order_index())
        .min()
        .unwrap_or(i64::MAX);
    (primary, manual)
}

/// Cluster entries into linked groups, members ordered by manual order, and
/// sort the groups by the given per-booking key.
fn cluster(entries: Vec<ManifestEntry>, key: impl Fn(&BookingCore) -> i64) -> Vec<LinkedGroup> {
    let mut groups: Vec<LinkedGroup> = Vec::new();
    let mut by_group: HashMap<Uuid, usize> = HashMap::new();

    for entry in entries {
        match entry.booking.group_id() {
            Some(gid) => {
                if let Some(&idx) = by_group.get(&gid) {
                    groups[idx].entries.push(entry);
                } else {
                    by_group.insert(gid, groups.len());
                    groups.push(LinkedGroup {
                        group_id: Some(gid),
                        tag_color: entry.booking.core().tag_color.clone(),
                        entries: vec![entry],
                    });
                }
            }
            None => groups.push(LinkedGroup {
                group_id: None,
                tag_color: entry.booking.core().tag_color.clone(),
                entries: vec![entry],
            }),
        }
    }

    for group in &mut groups {
        group.entries.sort_by_key(|e| e.booking.order_index());
        group.tag_color = group
            .entries
            .first()
            .and_then(|e| e.booking.core().tag_color.clone());
    }
    groups.sort_by_key(|g| group_sort_key(g, &key));
    groups
}

/// Sort buckets alphabetically, with the fallback bucket pinned last and
/// (for sub-buckets) the general bucket pinned first.
fn sort_labeled<T>(items: &mut Vec<(String, T)>, first: Option<&str>, last: Option<&str>) {
    items.sort_by(|(a, _), (b, _)| {
        let rank = |label: &str| {
            if Some(label) == first {
                0
            } else if Some(label) == last {
                2
            } else {
                1
            }
        };
        rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
    });
}

/// Build the manifest tree from a flat booking list. Pure: no side effects,
/// never fails — malformed data degrades into the fallback buckets.
pub fn build_hierarchy(
    bookings: &[Booking],
    luggage: &HashMap<i64, LuggageSummary>,
    mode: OrganizeMode,
    city_group_by: CityGroupBy,
) -> Hierarchy {
    let entries: Vec<ManifestEntry> = bookings
        .iter()
        .map(|b| ManifestEntry {
            booking: b.clone(),
            luggage: luggage.get(&b.id()).cloned().unwrap_or_default(),
        })
        .collect();

    let buckets = match mode {
        OrganizeMode::Default => build_default(entries),
        OrganizeMode::City => build_city(entries, city_group_by.leg()),
        OrganizeMode::Driver => build_by_party(entries, PartyDim::Driver),
        OrganizeMode::Broker => build_by_party(entries, PartyDim::Broker),
    };

    Hierarchy {
        mode,
        city_group_by: (mode == OrganizeMode::City).then_some(city_group_by),
        buckets,
    }
}

fn build_default(entries: Vec<ManifestEntry>) -> Vec<Bucket> {
    let groups = cluster(entries, |core| core.order_index);
    vec![Bucket {
        label: DEFAULT_BUCKET_LABEL.to_string(),
        sub_buckets: vec![SubBucket {
            label: GENERAL_LABEL.to_string(),
            groups,
        }],
    }]
}

fn build_city(entries: Vec<ManifestEntry>, leg: Leg) -> Vec<Bucket> {
    // city -> neighborhood -> entries, labels already folded
    let mut cities: Vec<(String, Vec<(String, Vec<ManifestEntry>)>)> = Vec::new();

    for entry in entries {
        let address = entry.booking.address_for(leg);
        let city = address
            .and_then(|a| a.city.as_deref())
            .map(fold_label)
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| NO_CITY_LABEL.to_string());
        // Blank and "general" (in any casing or accenting) collapse into the
        // canonical general sub-bucket.
        let neighborhood = address
            .and_then(|a| a.neighborhood.as_deref())
            .map(fold_label)
            .filter(|label| !label.is_empty() && label != GENERAL_LABEL)
            .unwrap_or_else(|| GENERAL_LABEL.to_string());

        let city_idx = match cities.iter().position(|(label, _)| *label == city) {
            Some(idx) => idx,
            None => {
                cities.push((city, Vec::new()));
                cities.len() - 1
            }
        };
        let neighborhoods = &mut cities[city_idx].1;
        match neighborhoods
            .iter()
            .position(|(label, _)| *label == neighborhood)
        {
            Some(idx) => neighborhoods[idx].1.push(entry),
            None => neighborhoods.push((neighborhood, vec![entry])),
        }
    }

    sort_labeled(&mut cities, None, Some(NO_CITY_LABEL));
    cities
        .into_iter()
        .map(|(city, mut neighborhoods)| {
            sort_labeled(&mut neighborhoods, Some(GENERAL_LABEL), None);
            Bucket {
                label: city,
                sub_buckets: neighborhoods
                    .into_iter()
                    .map(|(label, entries)| SubBucket {
                        label,
                        groups: cluster(entries, |core| {
                            core.city_order_index.unwrap_or(core.order_index)
                        }),
                    })
                    .collect(),
            }
        })
        .collect()
}

enum PartyDim {
    Driver,
    Broker,
}

fn build_by_party(entries: Vec<ManifestEntry>, dim: PartyDim) -> Vec<Bucket> {
    let fallback = match dim {
        PartyDim::Driver => NO_DRIVER_LABEL,
        PartyDim::Broker => NO_BROKER_LABEL,
    };

    let mut parties: Vec<(String, Vec<ManifestEntry>)> = Vec::new();
    for entry in entries {
        let core = entry.booking.core();
        let party = match dim {
            PartyDim::Driver => core.collector_driver.as_ref(),
            PartyDim::Broker => core.broker.as_ref(),
        };
        let label = party
            .map(|p| fold_label(&p.name))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| fallback.to_string());

        match parties.iter().position(|(l, _)| *l == label) {
            Some(idx) => parties[idx].1.push(entry),
            None => parties.push((label, vec![entry])),
        }
    }

    sort_labeled(&mut parties, None, Some(fallback));
    parties
        .into_iter()
        .map(|(label, entries)| Bucket {
            label,
            sub_buckets: vec![SubBucket {
                label: GENERAL_LABEL.to_string(),
                groups: cluster(entries, |core| core.order_index),
            }],
        })
        .collect()
}
