//! Static registry of monitored cities.
//!
//! The registry is fixed at compile time; provider requests are always made
//! for one of these coordinate pairs. Order matters: bulk operations walk
//! the registry front to back and return results in the same order.

use crate::model::City;

/// All monitored cities, in registry order.
pub const CITIES: &[City] = &[
    City { id: "tashkent", lat: 41.2995, lon: 69.2401 },
    City { id: "samarkand", lat: 39.6542, lon: 66.9597 },
    City { id: "bukhara", lat: 39.7681, lon: 64.4556 },
    City { id: "namangan", lat: 40.9983, lon: 71.6726 },
    City { id: "andijan", lat: 40.7821, lon: 72.3442 },
    City { id: "fergana", lat: 40.3864, lon: 71.7864 },
    City { id: "nukus", lat: 42.4619, lon: 59.6166 },
    City { id: "urgench", lat: 41.5500, lon: 60.6333 },
    City { id: "kokand", lat: 40.5286, lon: 70.9425 },
    City { id: "navoi", lat: 40.0844, lon: 65.3792 },
    City { id: "jizzakh", lat: 40.1158, lon: 67.8422 },
    City { id: "termez", lat: 37.2242, lon: 67.2783 },
    City { id: "qarshi", lat: 38.8600, lon: 65.8000 },
    City { id: "margilan", lat: 40.4703, lon: 71.7144 },
];

/// Look up a city by its identifier.
pub fn find(city_id: &str) -> Option<&'static City> {
    CITIES.iter().find(|city| city.id == city_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_order_is_stable() {
        assert_eq!(CITIES.len(), 14);
        assert_eq!(CITIES[0].id, "tashkent");
        assert_eq!(CITIES[13].id, "margilan");
    }

    #[test]
    fn ids_are_unique_lowercase_slugs() {
        let mut seen = std::collections::HashSet::new();
        for city in CITIES {
            assert!(seen.insert(city.id), "duplicate id {}", city.id);
            assert_eq!(city.id, city.id.to_lowercase());
            assert!(city.id.chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn find_known_and_unknown() {
        let city = find("bukhara").expect("bukhara is registered");
        assert!((city.lat - 39.7681).abs() < f64::EPSILON);

        assert!(find("atlantis").is_none());
        assert!(find("Tashkent").is_none(), "lookups are case-sensitive slugs");
    }
}
