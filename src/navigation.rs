//! Drill-down navigation over the catalog.
//!
//! States run World -> Continent -> Country -> State -> City. Choosing a
//! locality leaves the machine (see [`Transition::Exit`]) instead of adding a
//! sixth state. The selection chain is always a strict prefix: a deeper id is
//! never set while a shallower one is empty. Requests that would break that
//! fall back to the deepest valid ancestor.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{City, ContinentId, Country, GeoCatalog, GeoKey, GeoLevel, State};
use crate::coordinates::ResolvedLocation;
use crate::stats::StatsTarget;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NavLevel {
    #[default]
    World,
    Continent,
    Country,
    State,
    City,
}

impl NavLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavLevel::World => "world",
            NavLevel::Continent => "continent",
            NavLevel::Country => "country",
            NavLevel::State => "state",
            NavLevel::City => "city",
        }
    }

    /// Catalog level of the items listed while at this level.
    pub fn child_level(&self) -> GeoLevel {
        match self {
            NavLevel::World => GeoLevel::Continent,
            NavLevel::Continent => GeoLevel::Country,
            NavLevel::Country => GeoLevel::State,
            NavLevel::State => GeoLevel::City,
            NavLevel::City => GeoLevel::Locality,
        }
    }

    fn parent(&self) -> NavLevel {
        match self {
            NavLevel::World | NavLevel::Continent => NavLevel::World,
            NavLevel::Country => NavLevel::Continent,
            NavLevel::State => NavLevel::Country,
            NavLevel::City => NavLevel::State,
        }
    }
}

impl fmt::Display for NavLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current drill position. Countries are held by uppercased ISO code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NavigationState {
    pub level: NavLevel,
    pub continent: Option<ContinentId>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
}

impl NavigationState {
    /// Drop every selection deeper than `level`.
    fn truncated(&self, level: NavLevel) -> NavigationState {
        let mut next = self.clone();
        next.level = level;
        if level < NavLevel::City {
            next.city = None;
        }
        if level < NavLevel::State {
            next.state = None;
        }
        if level < NavLevel::Country {
            next.country = None;
        }
        if level < NavLevel::Continent {
            next.continent = None;
        }
        next
    }

    fn selected_id(&self, level: NavLevel) -> Option<&str> {
        match level {
            NavLevel::World => None,
            NavLevel::Continent => self.continent.as_ref().map(|c| c.as_str()),
            NavLevel::Country => self.country.as_deref(),
            NavLevel::State => self.state.as_deref(),
            NavLevel::City => self.city.as_deref(),
        }
    }
}

/// One visible child of the current node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub level: GeoLevel,
    /// Continent slug, country code, or state/city/locality id
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub level: NavLevel,
    pub id: String,
    pub name: String,
}

/// The locality handed to an external target when the machine exits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalityTarget {
    pub key: GeoKey,
    pub name: String,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Moved to the given level
    Moved(NavLevel),
    /// A locality was chosen; the navigation state is unchanged
    Exit(LocalityTarget),
    /// The item is not a child of the current node; nothing changed
    Rejected,
}

/// Identifier form of a drill position, suitable for links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
}

/// Filter passed to an external story listing for the current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum StoryFilter {
    Region {
        continent: ContinentId,
    },
    Country {
        country: String,
    },
    State {
        country: String,
        state: String,
    },
    City {
        country: String,
        state: String,
        city: String,
    },
}

/// Session navigation over a shared catalog.
#[derive(Debug, Clone)]
pub struct NavigationStateMachine {
    catalog: Arc<GeoCatalog>,
    state: NavigationState,
    auto_detect_used: bool,
}

impl NavigationStateMachine {
    pub fn new(catalog: Arc<GeoCatalog>) -> Self {
        Self {
            catalog,
            state: NavigationState::default(),
            auto_detect_used: false,
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn level(&self) -> NavLevel {
        self.state.level
    }

    pub fn catalog(&self) -> &GeoCatalog {
        &self.catalog
    }

    fn selected_country(&self) -> Option<&Country> {
        self.catalog.country_by_code(self.state.country.as_deref()?)
    }

    fn selected_state(&self) -> Option<&State> {
        self.selected_country()?.state(self.state.state.as_deref()?)
    }

    fn selected_city(&self) -> Option<&City> {
        self.selected_state()?.city(self.state.city.as_deref()?)
    }

    /// Descend into one of the current items.
    pub fn drill_down(&mut self, item: &NavItem) -> Transition {
        if item.level != self.state.level.child_level() {
            debug!(level = %self.state.level, item = %item.id, "Drill-down item at wrong level");
            return Transition::Rejected;
        }

        let mut next = self.state.clone();
        match self.state.level {
            NavLevel::World => match ContinentId::from_slug(&item.id) {
                Some(id) if self.catalog.continent(id).is_some() => {
                    next.continent = Some(id);
                    next.level = NavLevel::Continent;
                }
                _ => return Transition::Rejected,
            },
            NavLevel::Continent => {
                let code = item.id.to_ascii_uppercase();
                if self.catalog.continent_for_code(&code) != self.state.continent {
                    return Transition::Rejected;
                }
                next.country = Some(code);
                next.level = NavLevel::Country;
            }
            NavLevel::Country => {
                if self.selected_country().and_then(|c| c.state(&item.id)).is_none() {
                    return Transition::Rejected;
                }
                next.state = Some(item.id.clone());
                next.level = NavLevel::State;
            }
            NavLevel::State => {
                if self.selected_state().and_then(|s| s.city(&item.id)).is_none() {
                    return Transition::Rejected;
                }
                next.city = Some(item.id.clone());
                next.level = NavLevel::City;
            }
            NavLevel::City => {
                return match self.locality_target(&item.id) {
                    Some(target) => Transition::Exit(target),
                    None => Transition::Rejected,
                };
            }
        }

        self.state = next;
        Transition::Moved(self.state.level)
    }

    /// Descend by id, looking the item up among the current items.
    pub fn drill_down_id(&mut self, id: &str) -> Transition {
        let item = self
            .current_items()
            .into_iter()
            .find(|item| item.id.eq_ignore_ascii_case(id));
        match item {
            Some(item) => self.drill_down(&item),
            None => Transition::Rejected,
        }
    }

    fn locality_target(&self, locality_id: &str) -> Option<LocalityTarget> {
        let locality = self.selected_city()?.locality(locality_id)?;
        let key = GeoKey::Locality {
            continent: self.state.continent?,
            country: self.state.country.clone()?,
            state: self.state.state.clone()?,
            city: self.state.city.clone()?,
            locality: locality.id.clone(),
        };
        let path = self.catalog.path(&key)?;
        Some(LocalityTarget {
            key,
            name: locality.name.clone(),
            path,
        })
    }

    /// Jump back to an ancestor in the breadcrumb trail.
    ///
    /// A level deeper than the current one leaves the state as is. An id that
    /// does not match the selection at `level` lands on that level's parent.
    pub fn breadcrumb_jump(&mut self, level: NavLevel, id: &str) -> NavLevel {
        if level > self.state.level {
            debug!(
                %level,
                current = %self.state.level,
                "Breadcrumb jump below current level ignored"
            );
            return self.state.level;
        }

        let target = match self.state.selected_id(level) {
            None => NavLevel::World,
            Some(selected) if selected.eq_ignore_ascii_case(id) => level,
            Some(_) => {
                debug!(%level, id, "Stale breadcrumb, falling back to parent");
                level.parent()
            }
        };
        self.state = self.state.truncated(target);
        self.state.level
    }

    pub fn reset(&mut self) {
        self.breadcrumb_jump(NavLevel::World, "");
    }

    /// One-shot jump to a detected country.
    ///
    /// Only the first call per session is honoured, and only while the user
    /// is still at the world view. Returns whether the state changed.
    pub fn auto_detect(&mut self, country_code: &str, continent: ContinentId) -> bool {
        if std::mem::replace(&mut self.auto_detect_used, true) {
            return false;
        }
        if self.state.level != NavLevel::World {
            debug!("Auto-detect skipped, user already navigated");
            return false;
        }
        if self.catalog.continent_for_code(country_code) != Some(continent) {
            debug!(country_code, %continent, "Auto-detect location not in catalog");
            return false;
        }

        self.state = NavigationState {
            level: NavLevel::Country,
            continent: Some(continent),
            country: Some(country_code.to_ascii_uppercase()),
            state: None,
            city: None,
        };
        true
    }

    pub fn auto_detect_location(&mut self, location: &ResolvedLocation) -> bool {
        self.auto_detect(&location.country_code, location.continent)
    }

    pub fn auto_detect_used(&self) -> bool {
        self.auto_detect_used
    }

    /// Children of the deepest selected node, or the continents at World.
    pub fn current_items(&self) -> Vec<NavItem> {
        match self.state.level {
            NavLevel::World => self
                .catalog
                .continents()
                .iter()
                .map(|c| NavItem {
                    level: GeoLevel::Continent,
                    id: c.id.as_str().to_string(),
                    name: c.name.clone(),
                })
                .collect(),
            NavLevel::Continent => self
                .state
                .continent
                .and_then(|id| self.catalog.continent(id))
                .map(|c| {
                    c.countries
                        .iter()
                        .map(|country| NavItem {
                            level: GeoLevel::Country,
                            id: country.code_key(),
                            name: country.name.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            NavLevel::Country => self
                .selected_country()
                .map(|c| {
                    c.states
                        .iter()
                        .map(|s| NavItem {
                            level: GeoLevel::State,
                            id: s.id.clone(),
                            name: s.name.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            NavLevel::State => self
                .selected_state()
                .map(|s| {
                    s.cities
                        .iter()
                        .map(|c| NavItem {
                            level: GeoLevel::City,
                            id: c.id.clone(),
                            name: c.name.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            NavLevel::City => self
                .selected_city()
                .map(|c| {
                    c.localities
                        .iter()
                        .map(|l| NavItem {
                            level: GeoLevel::Locality,
                            id: l.id.clone(),
                            name: l.name.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let mut trail = Vec::new();
        let Some(continent) = self.state.continent.and_then(|id| self.catalog.continent(id)) else {
            return trail;
        };
        trail.push(Breadcrumb {
            level: NavLevel::Continent,
            id: continent.id.as_str().to_string(),
            name: continent.name.clone(),
        });
        let Some(country) = self.selected_country() else {
            return trail;
        };
        trail.push(Breadcrumb {
            level: NavLevel::Country,
            id: country.code_key(),
            name: country.name.clone(),
        });
        let Some(state) = self.selected_state() else {
            return trail;
        };
        trail.push(Breadcrumb {
            level: NavLevel::State,
            id: state.id.clone(),
            name: state.name.clone(),
        });
        if let Some(city) = self.selected_city() {
            trail.push(Breadcrumb {
                level: NavLevel::City,
                id: city.id.clone(),
                name: city.name.clone(),
            });
        }
        trail
    }

    /// Stats binding for the visible items; none below country level.
    pub fn stats_target(&self) -> Option<StatsTarget> {
        match self.state.level {
            NavLevel::World | NavLevel::Continent | NavLevel::Country => {
                let items = self.current_items();
                Some(StatsTarget::new(
                    self.state.level.child_level(),
                    items.into_iter().map(|item| item.id).collect(),
                ))
            }
            NavLevel::State | NavLevel::City => None,
        }
    }

    pub fn story_filter(&self) -> Option<StoryFilter> {
        let s = &self.state;
        match s.level {
            NavLevel::World => None,
            NavLevel::Continent => s.continent.map(|continent| StoryFilter::Region { continent }),
            NavLevel::Country => Some(StoryFilter::Country {
                country: s.country.clone()?,
            }),
            NavLevel::State => Some(StoryFilter::State {
                country: s.country.clone()?,
                state: s.state.clone()?,
            }),
            NavLevel::City => Some(StoryFilter::City {
                country: s.country.clone()?,
                state: s.state.clone()?,
                city: s.city.clone()?,
            }),
        }
    }

    pub fn address(&self) -> NavAddress {
        NavAddress {
            continent: self.state.continent.map(|c| c.as_str().to_string()),
            country: self.state.country.clone(),
            state: self.state.state.clone(),
            city: self.state.city.clone(),
            locality: None,
        }
    }

    /// Restore a drill position from a link.
    ///
    /// The deepest valid prefix of the address is applied; anything past the
    /// first broken link is dropped. A missing or unknown continent is
    /// inferred from the country code. A valid locality yields
    /// [`Transition::Exit`] with the state left at its city.
    pub fn apply_address(&mut self, address: &NavAddress) -> Transition {
        let continent = address
            .continent
            .as_deref()
            .and_then(ContinentId::from_slug)
            .filter(|id| self.catalog.continent(*id).is_some())
            .or_else(|| {
                address
                    .country
                    .as_deref()
                    .and_then(|code| self.catalog.continent_for_code(code))
            });
        self.state = self.restore_prefix(address, continent);

        match address.locality.as_deref() {
            Some(locality) if self.state.level == NavLevel::City => {
                match self.locality_target(locality) {
                    Some(target) => Transition::Exit(target),
                    None => Transition::Moved(self.state.level),
                }
            }
            _ => Transition::Moved(self.state.level),
        }
    }

    fn restore_prefix(
        &self,
        address: &NavAddress,
        continent: Option<ContinentId>,
    ) -> NavigationState {
        let mut next = NavigationState::default();
        let Some(continent) = continent else {
            return next;
        };
        next.continent = Some(continent);
        next.level = NavLevel::Continent;

        let Some(code) = address.country.as_deref() else {
            return next;
        };
        if self.catalog.continent_for_code(code) != Some(continent) {
            debug!(code, %continent, "Address country outside continent");
            return next;
        }
        let Some(country) = self.catalog.country_by_code(code) else {
            return next;
        };
        next.country = Some(country.code_key());
        next.level = NavLevel::Country;

        let Some(state) = address.state.as_deref().and_then(|id| country.state(id)) else {
            return next;
        };
        next.state = Some(state.id.clone());
        next.level = NavLevel::State;

        if let Some(city) = address.city.as_deref().and_then(|id| state.city(id)) {
            next.city = Some(city.id.clone());
            next.level = NavLevel::City;
        }
        next
    }

    /// Build a machine positioned at `address`.
    pub fn from_address(catalog: Arc<GeoCatalog>, address: &NavAddress) -> Self {
        let mut machine = Self::new(catalog);
        machine.apply_address(address);
        machine
    }

    /// Position the machine directly at a search hit.
    pub fn jump_to(&mut self, key: &GeoKey) -> Transition {
        let address = NavAddress {
            continent: Some(key.continent().as_str().to_string()),
            country: key.country_code().map(str::to_string),
            state: key.state_id().map(str::to_string),
            city: key.city_id().map(str::to_string),
            locality: key.locality_id().map(str::to_string),
        };
        self.apply_address(&address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> NavigationStateMachine {
        NavigationStateMachine::new(Arc::new(GeoCatalog::bundled().unwrap()))
    }

    fn assert_prefix(state: &NavigationState) {
        if state.city.is_some() {
            assert!(state.state.is_some());
        }
        if state.state.is_some() {
            assert!(state.country.is_some());
        }
        if state.country.is_some() {
            assert!(state.continent.is_some());
        }
    }

    #[test]
    fn test_world_lists_continents() {
        let nav = machine();
        let items = nav.current_items();
        assert_eq!(items.len(), 7);
        assert!(items.iter().all(|i| i.level == GeoLevel::Continent));
        assert!(nav.breadcrumbs().is_empty());
        assert_eq!(nav.story_filter(), None);
    }

    #[test]
    fn test_drill_to_locality_exits() {
        let mut nav = machine();
        assert_eq!(nav.drill_down_id("asia"), Transition::Moved(NavLevel::Continent));
        assert_eq!(nav.drill_down_id("in"), Transition::Moved(NavLevel::Country));
        assert_eq!(nav.drill_down_id("karnataka"), Transition::Moved(NavLevel::State));
        assert_eq!(nav.drill_down_id("bengaluru"), Transition::Moved(NavLevel::City));

        let before = nav.state().clone();
        match nav.drill_down_id("whitefield") {
            Transition::Exit(target) => {
                assert_eq!(target.name, "Whitefield");
                assert_eq!(
                    target.path,
                    vec!["Asia", "India", "Karnataka", "Bengaluru", "Whitefield"]
                );
            }
            other => panic!("expected exit, got {other:?}"),
        }
        assert_eq!(nav.state(), &before);
    }

    #[test]
    fn test_drill_rejects_foreign_items() {
        let mut nav = machine();
        nav.drill_down_id("europe");
        let foreign = NavItem {
            level: GeoLevel::Country,
            id: "IN".into(),
            name: "India".into(),
        };
        assert_eq!(nav.drill_down(&foreign), Transition::Rejected);
        assert_eq!(nav.level(), NavLevel::Continent);

        let wrong_level = NavItem {
            level: GeoLevel::City,
            id: "paris".into(),
            name: "Paris".into(),
        };
        assert_eq!(nav.drill_down(&wrong_level), Transition::Rejected);
    }

    #[test]
    fn test_breadcrumb_jump_clears_deeper() {
        let mut nav = machine();
        nav.drill_down_id("europe");
        nav.drill_down_id("FR");
        nav.drill_down_id("ile-de-france");
        nav.drill_down_id("paris");
        assert_eq!(nav.breadcrumbs().len(), 4);

        assert_eq!(nav.breadcrumb_jump(NavLevel::Country, "fr"), NavLevel::Country);
        assert_eq!(nav.state().state, None);
        assert_eq!(nav.state().city, None);
        assert_eq!(nav.breadcrumbs().len(), 2);
    }

    #[test]
    fn test_stale_breadcrumb_falls_back_to_parent() {
        let mut nav = machine();
        nav.drill_down_id("europe");
        nav.drill_down_id("DE");
        nav.drill_down_id("bavaria");
        assert_eq!(nav.breadcrumb_jump(NavLevel::Country, "FR"), NavLevel::Continent);
        assert_eq!(nav.state().continent, Some(ContinentId::Europe));
        assert_eq!(nav.state().country, None);
        assert_prefix(nav.state());
    }

    #[test]
    fn test_jump_below_current_is_ignored() {
        let mut nav = machine();
        nav.drill_down_id("asia");
        assert_eq!(nav.breadcrumb_jump(NavLevel::City, "mumbai"), NavLevel::Continent);
        assert_eq!(nav.state().continent, Some(ContinentId::Asia));
    }

    #[test]
    fn test_reset() {
        let mut nav = machine();
        nav.drill_down_id("oceania");
        nav.drill_down_id("AU");
        nav.reset();
        assert_eq!(nav.state(), &NavigationState::default());
    }

    #[test]
    fn test_auto_detect_is_one_shot() {
        let mut nav = machine();
        assert!(nav.auto_detect("in", ContinentId::Asia));
        assert_eq!(nav.level(), NavLevel::Country);
        assert_eq!(nav.state().country.as_deref(), Some("IN"));

        nav.reset();
        assert!(!nav.auto_detect("FR", ContinentId::Europe));
        assert_eq!(nav.level(), NavLevel::World);
    }

    #[test]
    fn test_auto_detect_rejects_mismatched_continent() {
        let mut nav = machine();
        assert!(!nav.auto_detect("IN", ContinentId::Europe));
        assert_eq!(nav.level(), NavLevel::World);
        assert!(nav.auto_detect_used());
    }

    #[test]
    fn test_auto_detect_skipped_after_user_navigation() {
        let mut nav = machine();
        nav.drill_down_id("africa");
        assert!(!nav.auto_detect("IN", ContinentId::Asia));
        assert_eq!(nav.state().continent, Some(ContinentId::Africa));
    }

    #[test]
    fn test_stats_target_by_level() {
        let mut nav = machine();
        let target = nav.stats_target().unwrap();
        assert_eq!(target.level, GeoLevel::Continent);
        assert!(target.keys.contains(&"north-america".to_string()));

        nav.drill_down_id("north-america");
        let target = nav.stats_target().unwrap();
        assert_eq!(target.level, GeoLevel::Country);
        assert_eq!(target.keys, vec!["US", "CA", "MX"]);

        nav.drill_down_id("US");
        assert_eq!(nav.stats_target().unwrap().level, GeoLevel::State);

        nav.drill_down_id("texas");
        assert_eq!(nav.stats_target(), None);
    }

    #[test]
    fn test_address_roundtrip() {
        let mut nav = machine();
        nav.drill_down_id("north-america");
        nav.drill_down_id("US");
        nav.drill_down_id("new-york");
        nav.drill_down_id("new-york-city");

        let address = nav.address();
        let restored = NavigationStateMachine::from_address(nav.catalog.clone(), &address);
        assert_eq!(restored.state(), nav.state());
        assert_eq!(
            restored.story_filter(),
            Some(StoryFilter::City {
                country: "US".into(),
                state: "new-york".into(),
                city: "new-york-city".into(),
            })
        );
    }

    #[test]
    fn test_broken_address_fails_closed() {
        let catalog = Arc::new(GeoCatalog::bundled().unwrap());
        let address = NavAddress {
            continent: Some("asia".into()),
            country: Some("IN".into()),
            state: Some("atlantis".into()),
            city: Some("mumbai".into()),
            locality: None,
        };
        let nav = NavigationStateMachine::from_address(catalog.clone(), &address);
        assert_eq!(nav.level(), NavLevel::Country);
        assert_eq!(nav.state().state, None);
        assert_eq!(nav.state().city, None);

        let mismatched = NavAddress {
            continent: Some("europe".into()),
            country: Some("IN".into()),
            ..Default::default()
        };
        let nav = NavigationStateMachine::from_address(catalog.clone(), &mismatched);
        assert_eq!(nav.level(), NavLevel::Continent);
        assert_eq!(nav.state().continent, Some(ContinentId::Europe));

        let unknown = NavAddress {
            continent: Some("mu".into()),
            ..Default::default()
        };
        let nav = NavigationStateMachine::from_address(catalog, &unknown);
        assert_eq!(nav.state(), &NavigationState::default());
    }

    #[test]
    fn test_address_without_continent_is_inferred() {
        let catalog = Arc::new(GeoCatalog::bundled().unwrap());
        let address = NavAddress {
            country: Some("br".into()),
            state: Some("sao-paulo".into()),
            ..Default::default()
        };
        let nav = NavigationStateMachine::from_address(catalog, &address);
        assert_eq!(nav.level(), NavLevel::State);
        assert_eq!(nav.state().continent, Some(ContinentId::SouthAmerica));
        assert_eq!(nav.state().country.as_deref(), Some("BR"));
    }

    #[test]
    fn test_unknown_continent_slug_falls_back_to_country_code() {
        let catalog = Arc::new(GeoCatalog::bundled().unwrap());
        let address = NavAddress {
            continent: Some("atlantis".into()),
            country: Some("jp".into()),
            state: Some("tokyo".into()),
            ..Default::default()
        };
        let nav = NavigationStateMachine::from_address(catalog, &address);
        assert_eq!(nav.level(), NavLevel::State);
        assert_eq!(nav.state().continent, Some(ContinentId::Asia));
        assert_eq!(nav.state().country.as_deref(), Some("JP"));
        assert_eq!(nav.state().state.as_deref(), Some("tokyo"));
    }

    #[test]
    fn test_jump_to_locality_key() {
        let mut nav = machine();
        let key = GeoKey::Locality {
            continent: ContinentId::Europe,
            country: "GB".into(),
            state: "england".into(),
            city: "london".into(),
            locality: "camden".into(),
        };
        assert!(matches!(nav.jump_to(&key), Transition::Exit(_)));
        assert_eq!(nav.level(), NavLevel::City);
        assert_eq!(nav.state().city.as_deref(), Some("london"));
    }

    #[test]
    fn test_prefix_invariant_under_mixed_operations() {
        let mut nav = machine();
        nav.drill_down_id("asia");
        assert_prefix(nav.state());
        nav.drill_down_id("jp");
        assert_prefix(nav.state());
        nav.breadcrumb_jump(NavLevel::State, "nowhere");
        assert_prefix(nav.state());
        nav.drill_down_id("tokyo");
        assert_prefix(nav.state());
        nav.breadcrumb_jump(NavLevel::State, "osaka");
        assert_eq!(nav.level(), NavLevel::Country);
        assert_prefix(nav.state());
        nav.breadcrumb_jump(NavLevel::Continent, "europe");
        assert_eq!(nav.level(), NavLevel::World);
        assert_prefix(nav.state());
        nav.auto_detect("KE", ContinentId::Africa);
        assert_prefix(nav.state());
        nav.drill_down_id("bogus");
        assert_prefix(nav.state());
        nav.reset();
        assert_prefix(nav.state());
    }
}
