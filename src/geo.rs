//! Fixed region-to-country lookup used for geographic breakdowns.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    pub name: &'static str,
    /// ISO 3166-1 alpha-3, the key choropleth maps expect.
    pub iso3: &'static str,
}

const REGION_COUNTRIES: [(&str, Country); 5] = [
    (
        "North America",
        Country {
            name: "United States",
            iso3: "USA",
        },
    ),
    (
        "Europe",
        Country {
            name: "Germany",
            iso3: "DEU",
        },
    ),
    (
        "Asia",
        Country {
            name: "India",
            iso3: "IND",
        },
    ),
    (
        "South America",
        Country {
            name: "Brazil",
            iso3: "BRA",
        },
    ),
    (
        "Africa",
        Country {
            name: "South Africa",
            iso3: "ZAF",
        },
    ),
];

pub fn country_for_region(region: &str) -> Option<&'static Country> {
    REGION_COUNTRIES
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, country)| country)
}

pub fn country_by_name(name: &str) -> Option<&'static Country> {
    REGION_COUNTRIES
        .iter()
        .map(|(_, country)| country)
        .find(|country| country.name == name)
}
