//! Sitemap document model and its sitemaps.org XML rendering.
//!
//! A document is an ordered list of URL records: the fixed static pages
//! first, then one record per game, then one record per category. Locations
//! are derived from the configured [`SiteBase`]; nothing here is persisted.

use std::fmt;

use url::Url;

use super::catalog::{CatalogEntry, CategoryEntry};
use super::error::DomainError;

pub const SITEMAP_XMLNS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

const GAME_SEGMENT: &str = "g";
const CATEGORY_SEGMENT: &str = "category";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFrequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ChangeFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFrequency::Daily => "daily",
            ChangeFrequency::Weekly => "weekly",
            ChangeFrequency::Monthly => "monthly",
            ChangeFrequency::Yearly => "yearly",
        }
    }
}

impl fmt::Display for ChangeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crawl priority in `[0.0, 1.0]`, held as tenths so it renders exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(u8);

impl Priority {
    pub const MAX_TENTHS: u8 = 10;

    pub const HOME: Priority = Priority(10);
    pub const LISTING: Priority = Priority(8);
    pub const CONTACT: Priority = Priority(5);
    pub const LEGAL: Priority = Priority(3);

    pub fn from_tenths(tenths: u8) -> Result<Self, DomainError> {
        if tenths > Self::MAX_TENTHS {
            return Err(DomainError::validation(format!(
                "priority {tenths}/10 exceeds 1.0"
            )));
        }
        Ok(Self(tenths))
    }

    pub fn tenths(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

/// Absolute `http`/`https` origin (optionally with a path prefix) that every
/// sitemap location is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteBase {
    url: Url,
}

impl SiteBase {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed)
            .map_err(|err| DomainError::validation(format!("invalid base url `{trimmed}`: {err}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(DomainError::validation(format!(
                "base url `{trimmed}` must use http or https"
            )));
        }
        if url.host_str().is_none() || url.cannot_be_a_base() {
            return Err(DomainError::validation(format!(
                "base url `{trimmed}` must name a host"
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(DomainError::validation(format!(
                "base url `{trimmed}` must not carry a query or fragment"
            )));
        }

        Ok(Self { url })
    }

    /// Base URL as parsed; a bare origin carries a trailing slash.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Append `segments` to the base path, percent-encoding each one.
    ///
    /// No segments yields the home location (base with trailing slash).
    pub fn location(&self, segments: &[&str]) -> Result<String, DomainError> {
        let mut url = self.url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| DomainError::invariant("site base cannot carry path segments"))?;
            path.pop_if_empty();
            if segments.is_empty() {
                path.push("");
            } else {
                path.extend(segments);
            }
        }
        Ok(url.into())
    }

    fn static_location(&self, path: &str) -> Result<String, DomainError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.location(&segments)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaticPage {
    pub path: &'static str,
    pub change_frequency: ChangeFrequency,
    pub priority: Priority,
}

/// Top-level pages, in document order.
pub const STATIC_PAGES: [StaticPage; 6] = [
    StaticPage {
        path: "/",
        change_frequency: ChangeFrequency::Daily,
        priority: Priority::HOME,
    },
    StaticPage {
        path: "/top-games",
        change_frequency: ChangeFrequency::Weekly,
        priority: Priority::LISTING,
    },
    StaticPage {
        path: "/new-releases",
        change_frequency: ChangeFrequency::Weekly,
        priority: Priority::LISTING,
    },
    StaticPage {
        path: "/contact-us",
        change_frequency: ChangeFrequency::Monthly,
        priority: Priority::CONTACT,
    },
    StaticPage {
        path: "/privacy-policy",
        change_frequency: ChangeFrequency::Yearly,
        priority: Priority::LEGAL,
    },
    StaticPage {
        path: "/about-us",
        change_frequency: ChangeFrequency::Yearly,
        priority: Priority::LEGAL,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapUrlRecord {
    pub location: String,
    pub change_frequency: ChangeFrequency,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapDocument {
    records: Vec<SitemapUrlRecord>,
}

impl SitemapDocument {
    pub fn build(
        base: &SiteBase,
        games: &[CatalogEntry],
        categories: &[CategoryEntry],
    ) -> Result<Self, DomainError> {
        let mut records = Vec::with_capacity(STATIC_PAGES.len() + games.len() + categories.len());

        for page in STATIC_PAGES.iter() {
            records.push(SitemapUrlRecord {
                location: base.static_location(page.path)?,
                change_frequency: page.change_frequency,
                priority: page.priority,
            });
        }

        for game in games {
            records.push(SitemapUrlRecord {
                location: base.location(&[GAME_SEGMENT, &game.slug])?,
                change_frequency: ChangeFrequency::Weekly,
                priority: Priority::LISTING,
            });
        }

        for category in categories {
            records.push(SitemapUrlRecord {
                location: base.location(&[CATEGORY_SEGMENT, &category.slug])?,
                change_frequency: ChangeFrequency::Weekly,
                priority: Priority::LISTING,
            });
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[SitemapUrlRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"{SITEMAP_XMLNS}\">\n"
        );
        for record in &self.records {
            xml.push_str("  <url>\n    <loc>");
            push_escaped(&mut xml, &record.location);
            xml.push_str("</loc>\n    <changefreq>");
            xml.push_str(record.change_frequency.as_str());
            xml.push_str("</changefreq>\n    <priority>");
            xml.push_str(&record.priority.to_string());
            xml.push_str("</priority>\n  </url>\n");
        }
        xml.push_str("</urlset>\n");
        xml
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
}
