//! Platform and template catalogs, and the variant planner.
//!
//! The platform catalog maps a case-sensitive identifier (`"Facebook"` and
//! `"facebook"` are different entries) to the ordered list of pixel sizes that
//! platform needs. Identifiers missing from the catalog are skipped by [`plan`]
//! rather than reported as errors; callers read a missing key as "unsupported".

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A target pixel size. Both sides are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl DimensionSpec {
    /// Create a dimension, rejecting zero on either side.
    ///
    /// # Errors
    ///
    /// Returns an error if `width` or `height` is zero.
    pub fn new(width: u32, height: u32) -> Result<Self, String> {
        if width == 0 || height == 0 {
            return Err(format!("Dimension {width}x{height} must be positive on both sides"));
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for DimensionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for DimensionSpec {
    type Err = String;

    /// Parse `"WIDTHxHEIGHT"`, e.g. `"1080x1920"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once('x')
            .ok_or_else(|| format!("Invalid dimension '{s}'. Expected WIDTHxHEIGHT"))?;
        let width = w.trim().parse::<u32>().map_err(|e| format!("Invalid width in '{s}': {e}"))?;
        let height =
            h.trim().parse::<u32>().map_err(|e| format!("Invalid height in '{s}': {e}"))?;
        Self::new(width, height)
    }
}

/// Sizes seeded for each platform when the config file has no `[platforms]` table.
const DEFAULT_PLATFORMS: &[(&str, &[&str])] = &[
    ("Facebook", &["1080x1080", "1080x1920", "1200x628"]),
    ("Instagram", &["1080x1080", "1080x1920"]),
    ("Google", &["125x125"]),
];

/// Read-only mapping from platform identifier to its required sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCatalog {
    entries: BTreeMap<String, Vec<DimensionSpec>>,
}

impl PlatformCatalog {
    /// Build a catalog from identifier → `"WIDTHxHEIGHT"` strings.
    ///
    /// # Errors
    ///
    /// Returns an error naming the platform if any dimension fails to parse.
    pub fn from_raw(raw: &BTreeMap<String, Vec<String>>) -> Result<Self, String> {
        let mut entries = BTreeMap::new();
        for (platform, sizes) in raw {
            let dims = sizes
                .iter()
                .map(|s| s.parse::<DimensionSpec>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| format!("Platform '{platform}': {e}"))?;
            entries.insert(platform.clone(), dims);
        }
        Ok(Self { entries })
    }

    /// Sizes for `platform`, if the identifier is known. Lookup is case-sensitive.
    #[must_use]
    pub fn get(&self, platform: &str) -> Option<&[DimensionSpec]> {
        self.entries.get(platform).map(Vec::as_slice)
    }

    /// All known identifiers, sorted.
    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for PlatformCatalog {
    fn default() -> Self {
        let entries = DEFAULT_PLATFORMS
            .iter()
            .map(|&(platform, sizes)| {
                let dims = sizes
                    .iter()
                    .filter_map(|s| s.parse::<DimensionSpec>().ok())
                    .collect::<Vec<_>>();
                (platform.to_string(), dims)
            })
            .collect();
        Self { entries }
    }
}

/// Expand platform identifiers into the sizes each one needs.
///
/// Unknown identifiers contribute no entry. Repeated identifiers collapse into
/// one entry. Size order within a platform follows the catalog.
#[must_use]
pub fn plan<S: AsRef<str>>(
    catalog: &PlatformCatalog,
    platforms: &[S],
) -> BTreeMap<String, Vec<DimensionSpec>> {
    platforms
        .iter()
        .filter_map(|p| {
            let p = p.as_ref();
            catalog.get(p).map(|dims| (p.to_string(), dims.to_vec()))
        })
        .collect()
}

/// Identifiers from `platforms` that the catalog does not know, in request order.
#[must_use]
pub fn unsupported<S: AsRef<str>>(catalog: &PlatformCatalog, platforms: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in platforms {
        let p = p.as_ref();
        if catalog.get(p).is_none() && !out.iter().any(|seen| seen == p) {
            out.push(p.to_string());
        }
    }
    out
}

/// Advisory pixel rectangle where the product should land in a template.
///
/// Only ever passed to the generator inside the instruction text; nothing
/// checks the generated image against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    /// Left edge (x of the top-left corner).
    pub left: u32,
    /// Top edge (y of the top-left corner).
    pub top: u32,
    /// Right edge (x of the bottom-right corner).
    pub right: u32,
    /// Bottom edge (y of the bottom-right corner).
    pub bottom: u32,
}

impl Placeholder {
    /// Check that the corners describe a non-empty rectangle.
    ///
    /// # Errors
    ///
    /// Returns an error if `left >= right` or `top >= bottom`.
    pub fn validate(&self) -> Result<(), String> {
        if self.left >= self.right || self.top >= self.bottom {
            return Err(format!(
                "Placeholder ({},{})-({},{}) is empty: top-left must be above and left of bottom-right",
                self.left, self.top, self.right, self.bottom
            ));
        }
        Ok(())
    }
}

impl FromStr for Placeholder {
    type Err = String;

    /// Parse `"LEFT,TOP,RIGHT,BOTTOM"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("Invalid placeholder '{s}': {e}"))?;
        match values.as_slice() {
            &[left, top, right, bottom] => {
                let rect = Self { left, top, right, bottom };
                rect.validate()?;
                Ok(rect)
            }
            _ => Err(format!("Invalid placeholder '{s}'. Expected LEFT,TOP,RIGHT,BOTTOM")),
        }
    }
}

/// One ad template: where to fetch it and where the product goes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateEntry {
    /// Template image locator.
    pub url: String,
    /// Left edge of the placeholder.
    pub left: u32,
    /// Top edge of the placeholder.
    pub top: u32,
    /// Right edge of the placeholder.
    pub right: u32,
    /// Bottom edge of the placeholder.
    pub bottom: u32,
}

impl TemplateEntry {
    /// The placeholder rectangle for this template.
    #[must_use]
    pub fn placeholder(&self) -> Placeholder {
        Placeholder { left: self.left, top: self.top, right: self.right, bottom: self.bottom }
    }
}

/// platform → `"WxH"` → version → template.
pub type TemplateCatalog = BTreeMap<String, BTreeMap<String, BTreeMap<String, TemplateEntry>>>;

/// Resolve a `PLATFORM/WxH/VERSION` reference against the template catalog.
///
/// # Errors
///
/// Returns an error if the reference is malformed or names no template.
pub fn resolve_template<'a>(
    templates: &'a TemplateCatalog,
    reference: &str,
) -> Result<&'a TemplateEntry, String> {
    let parts: Vec<&str> = reference.split('/').collect();
    let &[platform, dimension, version] = parts.as_slice() else {
        return Err(format!("Invalid template reference '{reference}'. Expected PLATFORM/WxH/VERSION"));
    };
    templates
        .get(platform)
        .and_then(|dims| dims.get(dimension))
        .and_then(|versions| versions.get(version))
        .ok_or_else(|| format!("No template '{reference}' in config"))
}
