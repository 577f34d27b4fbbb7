//! Static geographic hierarchy: continent, country, state, city, locality.
//!
//! The catalog is loaded once (bundled JSON or a file override), validated,
//! and never mutated afterwards. Every lookup returns `Option`; stale ids are
//! routine and are not errors.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;

const BUNDLED_CATALOG: &str = include_str!("../data/catalog.json");

/// The seven fixed continent identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContinentId {
    Africa,
    Antarctica,
    Asia,
    Europe,
    NorthAmerica,
    Oceania,
    SouthAmerica,
}

impl ContinentId {
    pub const ALL: [ContinentId; 7] = [
        ContinentId::Africa,
        ContinentId::Antarctica,
        ContinentId::Asia,
        ContinentId::Europe,
        ContinentId::NorthAmerica,
        ContinentId::Oceania,
        ContinentId::SouthAmerica,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContinentId::Africa => "africa",
            ContinentId::Antarctica => "antarctica",
            ContinentId::Asia => "asia",
            ContinentId::Europe => "europe",
            ContinentId::NorthAmerica => "north-america",
            ContinentId::Oceania => "oceania",
            ContinentId::SouthAmerica => "south-america",
        }
    }

    /// Parse a slug such as `"north-america"`. Case-insensitive.
    pub fn from_slug(slug: &str) -> Option<Self> {
        let slug = slug.to_ascii_lowercase();
        Self::ALL.into_iter().find(|id| id.as_str() == slug)
    }
}

impl fmt::Display for ContinentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocalityKind {
    CapitalArea,
    Hub,
    District,
    Area,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locality {
    pub id: String,
    pub name: String,
    pub kind: LocalityKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id: String,
    pub name: String,
    /// Whether this city is the capital of its state
    #[serde(default, rename = "capital")]
    pub is_state_capital: bool,
    #[serde(default)]
    pub localities: Vec<Locality>,
}

impl City {
    pub fn locality(&self, id: &str) -> Option<&Locality> {
        self.localities.iter().find(|l| l.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub cities: Vec<City>,
}

impl State {
    pub fn city(&self, id: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: String,
    pub name: String,
    /// ISO 3166-1 alpha-2 code, the join key for story events
    pub code: String,
    /// Display glyph (flag emoji)
    #[serde(default)]
    pub flag: String,
    #[serde(default)]
    pub states: Vec<State>,
}

impl Country {
    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.iter().find(|s| s.id == id)
    }

    /// Uppercased country code
    pub fn code_key(&self) -> String {
        self.code.to_ascii_uppercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Continent {
    pub id: ContinentId,
    pub name: String,
    #[serde(default)]
    pub countries: Vec<Country>,
}

/// Hierarchy level of a catalog node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoLevel {
    Continent,
    Country,
    State,
    City,
    Locality,
}

impl GeoLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoLevel::Continent => "continent",
            GeoLevel::Country => "country",
            GeoLevel::State => "state",
            GeoLevel::City => "city",
            GeoLevel::Locality => "locality",
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural identity of a catalog node: the parent chain plus the local id.
///
/// Countries are addressed by their uppercased ISO code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeoKey {
    Continent {
        continent: ContinentId,
    },
    Country {
        continent: ContinentId,
        country: String,
    },
    State {
        continent: ContinentId,
        country: String,
        state: String,
    },
    City {
        continent: ContinentId,
        country: String,
        state: String,
        city: String,
    },
    Locality {
        continent: ContinentId,
        country: String,
        state: String,
        city: String,
        locality: String,
    },
}

impl GeoKey {
    pub fn level(&self) -> GeoLevel {
        match self {
            GeoKey::Continent { .. } => GeoLevel::Continent,
            GeoKey::Country { .. } => GeoLevel::Country,
            GeoKey::State { .. } => GeoLevel::State,
            GeoKey::City { .. } => GeoLevel::City,
            GeoKey::Locality { .. } => GeoLevel::Locality,
        }
    }

    /// Number of nodes from the root down to and including this one.
    pub fn depth(&self) -> usize {
        self.level() as usize + 1
    }

    pub fn continent(&self) -> ContinentId {
        match self {
            GeoKey::Continent { continent }
            | GeoKey::Country { continent, .. }
            | GeoKey::State { continent, .. }
            | GeoKey::City { continent, .. }
            | GeoKey::Locality { continent, .. } => *continent,
        }
    }

    pub fn country_code(&self) -> Option<&str> {
        match self {
            GeoKey::Continent { .. } => None,
            GeoKey::Country { country, .. }
            | GeoKey::State { country, .. }
            | GeoKey::City { country, .. }
            | GeoKey::Locality { country, .. } => Some(country),
        }
    }

    pub fn state_id(&self) -> Option<&str> {
        match self {
            GeoKey::State { state, .. }
            | GeoKey::City { state, .. }
            | GeoKey::Locality { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn city_id(&self) -> Option<&str> {
        match self {
            GeoKey::City { city, .. } | GeoKey::Locality { city, .. } => Some(city),
            _ => None,
        }
    }

    pub fn locality_id(&self) -> Option<&str> {
        match self {
            GeoKey::Locality { locality, .. } => Some(locality),
            _ => None,
        }
    }

    /// Local id of the node at its own level.
    pub fn local_id(&self) -> &str {
        match self {
            GeoKey::Continent { continent } => continent.as_str(),
            GeoKey::Country { country, .. } => country,
            GeoKey::State { state, .. } => state,
            GeoKey::City { city, .. } => city,
            GeoKey::Locality { locality, .. } => locality,
        }
    }

    pub fn parent(&self) -> Option<GeoKey> {
        match self.clone() {
            GeoKey::Continent { .. } => None,
            GeoKey::Country { continent, .. } => Some(GeoKey::Continent { continent }),
            GeoKey::State {
                continent, country, ..
            } => Some(GeoKey::Country { continent, country }),
            GeoKey::City {
                continent,
                country,
                state,
                ..
            } => Some(GeoKey::State {
                continent,
                country,
                state,
            }),
            GeoKey::Locality {
                continent,
                country,
                state,
                city,
                ..
            } => Some(GeoKey::City {
                continent,
                country,
                state,
                city,
            }),
        }
    }
}

/// Borrowed view of any catalog node.
#[derive(Debug, Clone, Copy)]
pub enum GeoNode<'a> {
    Continent(&'a Continent),
    Country(&'a Country),
    State(&'a State),
    City(&'a City),
    Locality(&'a Locality),
}

impl<'a> GeoNode<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            GeoNode::Continent(c) => &c.name,
            GeoNode::Country(c) => &c.name,
            GeoNode::State(s) => &s.name,
            GeoNode::City(c) => &c.name,
            GeoNode::Locality(l) => &l.name,
        }
    }

    pub fn level(&self) -> GeoLevel {
        match self {
            GeoNode::Continent(_) => GeoLevel::Continent,
            GeoNode::Country(_) => GeoLevel::Country,
            GeoNode::State(_) => GeoLevel::State,
            GeoNode::City(_) => GeoLevel::City,
            GeoNode::Locality(_) => GeoLevel::Locality,
        }
    }
}

/// Node counts per level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub continents: usize,
    pub countries: usize,
    pub states: usize,
    pub cities: usize,
    pub localities: usize,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    version: Option<String>,
    continents: Vec<Continent>,
}

/// The immutable geographic catalog with its lookup indices.
#[derive(Debug, Clone)]
pub struct GeoCatalog {
    version: Option<String>,
    continents: Vec<Continent>,
    /// country id -> (continent index, country index)
    by_country_id: HashMap<String, (usize, usize)>,
    /// uppercased code -> (continent index, country index)
    by_country_code: HashMap<String, (usize, usize)>,
    /// uppercased code -> continent
    continent_by_code: HashMap<String, ContinentId>,
}

impl GeoCatalog {
    /// Load the catalog compiled into the binary.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    /// Load a catalog document from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(text)?;
        let mut catalog = Self::from_continents(doc.continents)?;
        catalog.version = doc.version;

        let summary = catalog.summary();
        info!(
            version = catalog.version.as_deref().unwrap_or("unversioned"),
            continents = summary.continents,
            countries = summary.countries,
            states = summary.states,
            cities = summary.cities,
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Validate a hierarchy and build the lookup indices.
    pub fn from_continents(continents: Vec<Continent>) -> Result<Self, CatalogError> {
        let mut seen_continents = HashSet::new();
        let mut by_country_id = HashMap::new();
        let mut by_country_code = HashMap::new();
        let mut continent_by_code = HashMap::new();

        for (ci, continent) in continents.iter().enumerate() {
            if !seen_continents.insert(continent.id) {
                return Err(CatalogError::DuplicateContinent(continent.id.to_string()));
            }

            for (ki, country) in continent.countries.iter().enumerate() {
                if country.code.len() != 2
                    || !country.code.chars().all(|c| c.is_ascii_alphabetic())
                {
                    return Err(CatalogError::InvalidCountryCode {
                        country: country.id.clone(),
                        code: country.code.clone(),
                    });
                }
                if by_country_id.insert(country.id.clone(), (ci, ki)).is_some() {
                    return Err(CatalogError::DuplicateCountry(country.id.clone()));
                }
                let code = country.code_key();
                if by_country_code.insert(code.clone(), (ci, ki)).is_some() {
                    return Err(CatalogError::DuplicateCountryCode(code));
                }
                continent_by_code.insert(code, continent.id);

                validate_country(country)?;
            }
        }

        Ok(Self {
            version: None,
            continents,
            by_country_id,
            by_country_code,
            continent_by_code,
        })
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn continents(&self) -> &[Continent] {
        &self.continents
    }

    pub fn continent(&self, id: ContinentId) -> Option<&Continent> {
        self.continents.iter().find(|c| c.id == id)
    }

    pub fn continent_by_slug(&self, slug: &str) -> Option<&Continent> {
        ContinentId::from_slug(slug).and_then(|id| self.continent(id))
    }

    pub fn country(&self, id: &str) -> Option<&Country> {
        self.by_country_id
            .get(id)
            .map(|&(ci, ki)| &self.continents[ci].countries[ki])
    }

    /// Case-insensitive lookup by ISO code.
    pub fn country_by_code(&self, code: &str) -> Option<&Country> {
        self.by_country_code
            .get(&code.to_ascii_uppercase())
            .map(|&(ci, ki)| &self.continents[ci].countries[ki])
    }

    pub fn state(&self, country_code: &str, state_id: &str) -> Option<&State> {
        self.country_by_code(country_code)?.state(state_id)
    }

    pub fn city(&self, country_code: &str, state_id: &str, city_id: &str) -> Option<&City> {
        self.state(country_code, state_id)?.city(city_id)
    }

    /// Every country in catalog order.
    pub fn all_countries(&self) -> Vec<&Country> {
        self.continents
            .iter()
            .flat_map(|c| c.countries.iter())
            .collect()
    }

    /// Reverse lookup from a country code (any case) to its continent.
    pub fn continent_for_code(&self, code: &str) -> Option<ContinentId> {
        self.continent_by_code
            .get(&code.to_ascii_uppercase())
            .copied()
    }

    /// The uppercased-code to continent index.
    pub fn continent_index(&self) -> &HashMap<String, ContinentId> {
        &self.continent_by_code
    }

    pub fn summary(&self) -> CatalogSummary {
        let mut summary = CatalogSummary {
            continents: self.continents.len(),
            ..Default::default()
        };
        for country in self.continents.iter().flat_map(|c| c.countries.iter()) {
            summary.countries += 1;
            for state in &country.states {
                summary.states += 1;
                summary.cities += state.cities.len();
                summary.localities += state
                    .cities
                    .iter()
                    .map(|c| c.localities.len())
                    .sum::<usize>();
            }
        }
        summary
    }

    /// Key for a country, derived from its code.
    pub fn country_key(&self, code: &str) -> Option<GeoKey> {
        let continent = self.continent_for_code(code)?;
        Some(GeoKey::Country {
            continent,
            country: code.to_ascii_uppercase(),
        })
    }

    /// Find the node a key points at, checking every ancestor link.
    pub fn resolve(&self, key: &GeoKey) -> Option<GeoNode<'_>> {
        let continent = self.continent(key.continent())?;
        let Some(code) = key.country_code() else {
            return Some(GeoNode::Continent(continent));
        };
        if self.continent_for_code(code)? != continent.id {
            return None;
        }
        let country = self.country_by_code(code)?;
        let Some(state_id) = key.state_id() else {
            return Some(GeoNode::Country(country));
        };
        let state = country.state(state_id)?;
        let Some(city_id) = key.city_id() else {
            return Some(GeoNode::State(state));
        };
        let city = state.city(city_id)?;
        match key.locality_id() {
            Some(locality_id) => city.locality(locality_id).map(GeoNode::Locality),
            None => Some(GeoNode::City(city)),
        }
    }

    /// Names from the continent down to the node.
    pub fn path(&self, key: &GeoKey) -> Option<Vec<String>> {
        let mut names = Vec::with_capacity(key.depth());
        let mut cursor = Some(key.clone());
        while let Some(k) = cursor {
            names.push(self.resolve(&k)?.name().to_string());
            cursor = k.parent();
        }
        names.reverse();
        Some(names)
    }
}

fn validate_country(country: &Country) -> Result<(), CatalogError> {
    check_unique("state", &country.id, country.states.iter().map(|s| s.id.as_str()))?;
    for state in &country.states {
        let parent = format!("{}/{}", country.id, state.id);
        check_unique("city", &parent, state.cities.iter().map(|c| c.id.as_str()))?;
        for city in &state.cities {
            let parent = format!("{}/{}", parent, city.id);
            check_unique("locality", &parent, city.localities.iter().map(|l| l.id.as_str()))?;
        }
    }
    Ok(())
}

fn check_unique<'a>(
    kind: &'static str,
    parent: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CatalogError::DuplicateChild {
                kind,
                parent: parent.to_string(),
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(id: &str, name: &str) -> City {
        City {
            id: id.into(),
            name: name.into(),
            is_state_capital: false,
            localities: vec![],
        }
    }

    fn country(id: &str, code: &str, states: Vec<State>) -> Country {
        Country {
            id: id.into(),
            name: id.into(),
            code: code.into(),
            flag: String::new(),
            states,
        }
    }

    fn continent(id: ContinentId, countries: Vec<Country>) -> Continent {
        Continent {
            id,
            name: id.to_string(),
            countries,
        }
    }

    #[test]
    fn test_continent_slug_roundtrip() {
        for id in ContinentId::ALL {
            assert_eq!(ContinentId::from_slug(id.as_str()), Some(id));
        }
        assert_eq!(ContinentId::from_slug("North-America"), Some(ContinentId::NorthAmerica));
        assert_eq!(ContinentId::from_slug("atlantis"), None);
    }

    #[test]
    fn test_duplicate_country_code_is_case_insensitive() {
        let err = GeoCatalog::from_continents(vec![
            continent(ContinentId::Europe, vec![country("france", "FR", vec![])]),
            continent(ContinentId::Africa, vec![country("other", "fr", vec![])]),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCountryCode(code) if code == "FR"));
    }

    #[test]
    fn test_duplicate_country_id_rejected() {
        let err = GeoCatalog::from_continents(vec![continent(
            ContinentId::Europe,
            vec![country("georgia", "GE", vec![]), country("georgia", "GX", vec![])],
        )])
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCountry(_)));
    }

    #[test]
    fn test_duplicate_continent_rejected() {
        let err = GeoCatalog::from_continents(vec![
            continent(ContinentId::Asia, vec![]),
            continent(ContinentId::Asia, vec![]),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateContinent(_)));
    }

    #[test]
    fn test_invalid_country_code_rejected() {
        let err = GeoCatalog::from_continents(vec![continent(
            ContinentId::Asia,
            vec![country("india", "IND", vec![])],
        )])
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidCountryCode { .. }));
    }

    #[test]
    fn test_duplicate_city_within_state_rejected() {
        let state = State {
            id: "s".into(),
            name: "S".into(),
            code: None,
            cities: vec![city("a", "A"), city("a", "A again")],
        };
        let err = GeoCatalog::from_continents(vec![continent(
            ContinentId::Asia,
            vec![country("x", "XX", vec![state])],
        )])
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateChild { kind: "city", .. }));
    }

    #[test]
    fn test_same_city_id_in_different_states_allowed() {
        let s1 = State {
            id: "s1".into(),
            name: "S1".into(),
            code: None,
            cities: vec![city("springfield", "Springfield")],
        };
        let s2 = State {
            id: "s2".into(),
            name: "S2".into(),
            code: None,
            cities: vec![city("springfield", "Springfield")],
        };
        let catalog = GeoCatalog::from_continents(vec![continent(
            ContinentId::NorthAmerica,
            vec![country("us", "US", vec![s1, s2])],
        )])
        .unwrap();
        assert!(catalog.city("us", "s1", "springfield").is_some());
        assert!(catalog.city("US", "s2", "springfield").is_some());
    }

    #[test]
    fn test_resolve_rejects_wrong_continent() {
        let catalog = GeoCatalog::from_continents(vec![
            continent(ContinentId::Europe, vec![country("france", "FR", vec![])]),
            continent(ContinentId::Asia, vec![]),
        ])
        .unwrap();
        let wrong = GeoKey::Country {
            continent: ContinentId::Asia,
            country: "FR".into(),
        };
        assert!(catalog.resolve(&wrong).is_none());
        assert!(catalog.path(&wrong).is_none());

        let right = catalog.country_key("fr").unwrap();
        assert_eq!(catalog.path(&right).unwrap(), vec!["europe", "france"]);
    }

    #[test]
    fn test_bundled_catalog_loads() {
        let catalog = GeoCatalog::bundled().unwrap();
        let summary = catalog.summary();
        assert_eq!(summary.continents, 7);
        assert!(summary.countries > 0);
        assert!(summary.cities >= summary.states);
        let antarctica = catalog.continent(ContinentId::Antarctica).unwrap();
        assert!(antarctica.countries.is_empty());
    }
}
