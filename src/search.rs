//! Substring search across all five catalog levels.

use serde::Serialize;

use crate::catalog::{GeoCatalog, GeoKey, GeoLevel};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Queries shorter than this return nothing.
pub const MIN_QUERY_CHARS: usize = 2;

/// A single search hit with enough identity to jump straight to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub kind: GeoLevel,
    pub key: GeoKey,
    /// Catalog id of the country on the path, if any
    pub country_id: Option<String>,
    pub name: String,
    /// Names from the continent down to the hit
    pub path: Vec<String>,
}

struct Collector {
    limit: usize,
    results: Vec<SearchResult>,
}

impl Collector {
    /// Returns true once the limit is reached.
    fn push(&mut self, result: SearchResult) -> bool {
        self.results.push(result);
        self.is_full()
    }

    fn is_full(&self) -> bool {
        self.results.len() >= self.limit
    }
}

/// Read-only search view over a catalog.
#[derive(Debug, Clone, Copy)]
pub struct LocationSearchIndex<'a> {
    catalog: &'a GeoCatalog,
}

impl<'a> LocationSearchIndex<'a> {
    pub fn new(catalog: &'a GeoCatalog) -> Self {
        Self { catalog }
    }

    /// Search with the default limit.
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        self.search_with_limit(query, DEFAULT_SEARCH_LIMIT)
    }

    /// Case-insensitive name containment at every level, plus exact ISO code
    /// match for countries. Results come back in depth-first catalog order and
    /// the scan stops as soon as `limit` hits are collected.
    pub fn search_with_limit(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_CHARS || limit == 0 {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        let matches = |name: &str| name.to_lowercase().contains(&needle);

        let mut out = Collector {
            limit,
            results: Vec::new(),
        };

        for continent in self.catalog.continents() {
            let continent_path = vec![continent.name.clone()];
            if matches(&continent.name)
                && out.push(SearchResult {
                    kind: GeoLevel::Continent,
                    key: GeoKey::Continent {
                        continent: continent.id,
                    },
                    country_id: None,
                    name: continent.name.clone(),
                    path: continent_path.clone(),
                })
            {
                return out.results;
            }

            for country in &continent.countries {
                let code = country.code_key();
                let country_key = GeoKey::Country {
                    continent: continent.id,
                    country: code.clone(),
                };
                let country_path = extend(&continent_path, &country.name);
                if (matches(&country.name) || country.code.eq_ignore_ascii_case(query))
                    && out.push(SearchResult {
                        kind: GeoLevel::Country,
                        key: country_key,
                        country_id: Some(country.id.clone()),
                        name: country.name.clone(),
                        path: country_path.clone(),
                    })
                {
                    return out.results;
                }

                for state in &country.states {
                    let state_path = extend(&country_path, &state.name);
                    if matches(&state.name)
                        && out.push(SearchResult {
                            kind: GeoLevel::State,
                            key: GeoKey::State {
                                continent: continent.id,
                                country: code.clone(),
                                state: state.id.clone(),
                            },
                            country_id: Some(country.id.clone()),
                            name: state.name.clone(),
                            path: state_path.clone(),
                        })
                    {
                        return out.results;
                    }

                    for city in &state.cities {
                        let city_path = extend(&state_path, &city.name);
                        if matches(&city.name)
                            && out.push(SearchResult {
                                kind: GeoLevel::City,
                                key: GeoKey::City {
                                    continent: continent.id,
                                    country: code.clone(),
                                    state: state.id.clone(),
                                    city: city.id.clone(),
                                },
                                country_id: Some(country.id.clone()),
                                name: city.name.clone(),
                                path: city_path.clone(),
                            })
                        {
                            return out.results;
                        }

                        for locality in &city.localities {
                            if matches(&locality.name)
                                && out.push(SearchResult {
                                    kind: GeoLevel::Locality,
                                    key: GeoKey::Locality {
                                        continent: continent.id,
                                        country: code.clone(),
                                        state: state.id.clone(),
                                        city: city.id.clone(),
                                        locality: locality.id.clone(),
                                    },
                                    country_id: Some(country.id.clone()),
                                    name: locality.name.clone(),
                                    path: extend(&city_path, &locality.name),
                                })
                            {
                                return out.results;
                            }
                        }
                    }
                }
            }
        }

        out.results
    }
}

fn extend(path: &[String], name: &str) -> Vec<String> {
    let mut next = Vec::with_capacity(path.len() + 1);
    next.extend_from_slice(path);
    next.push(name.to_string());
    next
}
