use crate::model::Room;

// ── Query-by-example room matching ───────────────────────────────

/// Room search conditions. Every field is optional; unset fields don't
/// constrain the result.
#[derive(Debug, Clone, Default)]
pub struct RoomFilter {
    /// Matched within ±20%, or as a minimum when `min_capacity` is set.
    pub capacity: Option<u32>,
    pub min_capacity: bool,
    pub site: Option<String>,
    pub building: Option<String>,
    /// Every requested item must be present on the room.
    pub equipment: Vec<String>,
    /// Matched across name, site, building, floor, comments, responsible,
    /// equipment and custom attribute values. A quoted string matches as an
    /// exact phrase; otherwise any single word matching is enough.
    pub free_text: Option<String>,
    pub include_inactive: bool,
    pub only_reservable: bool,
    /// Only rooms with no collision for this candidate period.
    pub available_for: Option<crate::model::Series>,
}

impl RoomFilter {
    /// All conditions except `available_for`, which needs booking state.
    pub fn matches_room(&self, room: &Room) -> bool {
        if !self.include_inactive && !room.is_active {
            return false;
        }
        if self.only_reservable && !room.is_reservable {
            return false;
        }
        if let Some(cap) = self.capacity {
            if self.min_capacity {
                if room.capacity < cap {
                    return false;
                }
            } else {
                // Within 20% of the requested size.
                let slack = cap / 5;
                if room.capacity + slack < cap || room.capacity > cap + slack {
                    return false;
                }
            }
        }
        if let Some(ref site) = self.site
            && !room.site.eq_ignore_ascii_case(site) {
                return false;
            }
        if let Some(ref building) = self.building {
            match &room.building {
                Some(b) if b.eq_ignore_ascii_case(building) => {}
                _ => return false,
            }
        }
        for item in &self.equipment {
            if !room.equipment.iter().any(|e| e.eq_ignore_ascii_case(item)) {
                return false;
            }
        }
        if let Some(ref text) = self.free_text
            && !free_text_matches(text, room) {
                return false;
            }
        true
    }
}

/// Quoted queries match as an exact phrase; unquoted queries match if any
/// word appears somewhere in the room's textual attributes.
fn free_text_matches(query: &str, room: &Room) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let haystack = room_haystack(room);

    let quoted = query.len() >= 2
        && (query.starts_with('"') && query.ends_with('"')
            || query.starts_with('\'') && query.ends_with('\''));
    if quoted {
        let phrase = query[1..query.len() - 1].to_lowercase();
        return haystack.contains(&phrase);
    }
    query
        .split_whitespace()
        .any(|word| haystack.contains(&word.to_lowercase()))
}

fn room_haystack(room: &Room) -> String {
    let mut parts: Vec<&str> = vec![&room.name, &room.site];
    if let Some(ref b) = room.building {
        parts.push(b);
    }
    if let Some(ref f) = room.floor {
        parts.push(f);
    }
    if let Some(ref c) = room.comments {
        parts.push(c);
    }
    if let Some(ref r) = room.responsible_email {
        parts.push(r);
    }
    for e in &room.equipment {
        parts.push(e);
    }
    for v in room.custom_attrs.values() {
        parts.push(v);
    }
    parts.join("\n").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn room() -> Room {
        let mut r = Room::new(Ulid::new(), "AT Amphitheatre", "Meyrin", 30);
        r.building = Some("40".into());
        r.comments = Some("Ask Jean for the key".into());
        r.equipment = vec!["Projector".into(), "Whiteboard".into()];
        r.custom_attrs.insert("h323-ip".into(), "137.138.1.1".into());
        r
    }

    #[test]
    fn default_filter_matches_active_rooms() {
        let f = RoomFilter::default();
        assert!(f.matches_room(&room()));

        let mut inactive = room();
        inactive.is_active = false;
        assert!(!f.matches_room(&inactive));
        assert!(RoomFilter { include_inactive: true, ..Default::default() }.matches_room(&inactive));
    }

    #[test]
    fn capacity_within_twenty_percent() {
        let f = RoomFilter { capacity: Some(30), ..Default::default() };
        for cap in [24, 30, 36] {
            let mut r = room();
            r.capacity = cap;
            assert!(f.matches_room(&r), "capacity {cap} should match");
        }
        for cap in [23, 37, 100] {
            let mut r = room();
            r.capacity = cap;
            assert!(!f.matches_room(&r), "capacity {cap} should not match");
        }
    }

    #[test]
    fn minimum_capacity() {
        let f = RoomFilter { capacity: Some(30), min_capacity: true, ..Default::default() };
        let mut r = room();
        r.capacity = 100;
        assert!(f.matches_room(&r));
        r.capacity = 29;
        assert!(!f.matches_room(&r));
    }

    #[test]
    fn equipment_subset_required() {
        let f = RoomFilter { equipment: vec!["projector".into()], ..Default::default() };
        assert!(f.matches_room(&room()));

        let f = RoomFilter {
            equipment: vec!["projector".into(), "video link".into()],
            ..Default::default()
        };
        assert!(!f.matches_room(&room()));
    }

    #[test]
    fn free_text_any_word() {
        let f = RoomFilter { free_text: Some("jean".into()), ..Default::default() };
        assert!(f.matches_room(&room()));

        // One matching word out of several is enough.
        let f = RoomFilter { free_text: Some("nonexistent jean".into()), ..Default::default() };
        assert!(f.matches_room(&room()));

        let f = RoomFilter { free_text: Some("nothing here".into()), ..Default::default() };
        assert!(!f.matches_room(&room()));
    }

    #[test]
    fn free_text_quoted_phrase() {
        let f = RoomFilter { free_text: Some("\"ask jean\"".into()), ..Default::default() };
        assert!(f.matches_room(&room()));

        // The words exist but not as a phrase.
        let f = RoomFilter { free_text: Some("\"jean ask\"".into()), ..Default::default() };
        assert!(!f.matches_room(&room()));
    }

    #[test]
    fn free_text_searches_custom_attrs() {
        let f = RoomFilter { free_text: Some("137.138.1.1".into()), ..Default::default() };
        assert!(f.matches_room(&room()));
    }

    #[test]
    fn site_and_building_exact() {
        let f = RoomFilter { site: Some("meyrin".into()), ..Default::default() };
        assert!(f.matches_room(&room()));
        let f = RoomFilter { site: Some("prevessin".into()), ..Default::default() };
        assert!(!f.matches_room(&room()));
        let f = RoomFilter { building: Some("40".into()), ..Default::default() };
        assert!(f.matches_room(&room()));
        let f = RoomFilter { building: Some("31".into()), ..Default::default() };
        assert!(!f.matches_room(&room()));
    }
}
