//! # Regions
//! Fixed table of police regions that publish an incident feed.
//!
//! The table is built once per process and never mutated. Feed URLs are
//! produced from a template with two placeholders:
//! - `{segment}`: the region's path segment (the id, except for `jonkoping`)
//! - `{region}`: the region id

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::FeedError;

pub const DEFAULT_URL_TEMPLATE: &str =
    "https://polisen.se/aktuellt/rss/{segment}/handelser-rss---{region}/";

/// Sentinel selecting every known region.
pub const ALL_REGIONS: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: &'static str,
    pub name: &'static str,
}

impl Region {
    /// Path segment used in the feed URL. Jönköping is published under the
    /// county name rather than its id.
    pub fn path_segment(&self) -> &'static str {
        match self.id {
            "jonkoping" => "jonkopings-lan",
            id => id,
        }
    }
}

static REGIONS: Lazy<BTreeMap<&'static str, Region>> = Lazy::new(|| {
    [
        ("blekinge", "Blekinge"),
        ("dalarna", "Dalarna"),
        ("gotland", "Gotland"),
        ("gavleborg", "Gävleborg"),
        ("halland", "Halland"),
        ("jamtland", "Jämtland"),
        ("jonkoping", "Jönköping"),
        ("kalmar-lan", "Kalmar Län"),
        ("kronoberg", "Kronoberg"),
        ("norrbotten", "Norrbotten"),
        ("skane", "Skåne"),
        ("sodermanland", "Södermanland"),
        ("stockholms-lan", "Stockholms Län"),
        ("uppsala-lan", "Uppsala Län"),
        ("varmland", "Värmland"),
        ("vasterbotten", "Västerbotten"),
        ("vasternorrland", "Västernorrland"),
        ("vastmanland", "Västmanland"),
        ("vastra-gotaland", "Västra Götaland"),
        ("orebro-lan", "Örebro Län"),
        ("ostergotland", "Östergötland"),
    ]
    .into_iter()
    .map(|(id, name)| (id, Region { id, name }))
    .collect()
});

/// Region lookup bound to a feed URL template.
#[derive(Debug, Clone)]
pub struct Regions {
    url_template: String,
}

impl Default for Regions {
    fn default() -> Self {
        Self::new(DEFAULT_URL_TEMPLATE)
    }
}

impl Regions {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }

    pub fn exists(&self, region_id: &str) -> bool {
        REGIONS.contains_key(region_id)
    }

    pub fn get(&self, region_id: &str) -> Option<&'static Region> {
        REGIONS.get(region_id)
    }

    /// All known region ids in ascending order.
    pub fn list_ids(&self) -> Vec<&'static str> {
        REGIONS.keys().copied().collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &'static Region> {
        REGIONS.values()
    }

    /// Feed URL for a region. Unknown ids fall back to using the id as the
    /// path segment; callers validate with [`Regions::resolve`] first.
    pub fn source_url(&self, region_id: &str) -> String {
        let segment = self
            .get(region_id)
            .map(Region::path_segment)
            .unwrap_or(region_id);
        self.url_template
            .replace("{segment}", segment)
            .replace("{region}", region_id)
    }

    /// Validate a selection of region ids. A single `all` (or an empty
    /// selection) expands to every known region. Duplicates are dropped,
    /// first occurrence wins.
    pub fn resolve<S: AsRef<str>>(&self, selection: &[S]) -> Result<Vec<&'static str>, FeedError> {
        let wants_all = selection.is_empty()
            || (selection.len() == 1 && selection[0].as_ref().trim() == ALL_REGIONS);
        if wants_all {
            return Ok(self.list_ids());
        }

        let mut out: Vec<&'static str> = Vec::with_capacity(selection.len());
        for raw in selection {
            let id = raw.as_ref().trim();
            let region = self.get(id).ok_or_else(|| FeedError::UnknownRegion {
                region: id.to_string(),
                valid: self.list_ids().join(","),
            })?;
            if !out.contains(&region.id) {
                out.push(region.id);
            }
        }
        Ok(out)
    }
}

/// Split a comma-separated CLI/config value into region ids.
pub fn parse_selection(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
