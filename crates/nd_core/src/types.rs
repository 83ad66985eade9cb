use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::Error;

/// Countries the pipeline covers. Serialized as the uppercase code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Country {
    Usa,
    Russia,
    India,
    China,
    Japan,
    Uk,
    Germany,
    France,
    Brazil,
    Australia,
}

impl Country {
    pub fn as_str(&self) -> &'static str {
        match self {
            Country::Usa => "USA",
            Country::Russia => "RUSSIA",
            Country::India => "INDIA",
            Country::China => "CHINA",
            Country::Japan => "JAPAN",
            Country::Uk => "UK",
            Country::Germany => "GERMANY",
            Country::France => "FRANCE",
            Country::Brazil => "BRAZIL",
            Country::Australia => "AUSTRALIA",
        }
    }

    /// Full name used when building search queries.
    pub fn display_name(&self) -> &'static str {
        match self {
            Country::Usa => "United States",
            Country::Russia => "Russia",
            Country::India => "India",
            Country::China => "China",
            Country::Japan => "Japan",
            Country::Uk => "United Kingdom",
            Country::Germany => "Germany",
            Country::France => "France",
            Country::Brazil => "Brazil",
            Country::Australia => "Australia",
        }
    }

    /// Best-effort guess from a source URL's host. Covers ccTLDs and a
    /// handful of well-known outlets, nothing more.
    pub fn from_domain(source_url: &str) -> Option<Country> {
        let url = Url::parse(source_url).ok()?;
        let host = url.host_str()?.to_lowercase();

        let by_tld = [
            (".ru", Country::Russia),
            (".in", Country::India),
            (".cn", Country::China),
            (".jp", Country::Japan),
            (".uk", Country::Uk),
            (".de", Country::Germany),
            (".fr", Country::France),
            (".br", Country::Brazil),
            (".au", Country::Australia),
            (".us", Country::Usa),
        ];
        for (suffix, country) in by_tld {
            if host.ends_with(suffix) {
                return Some(country);
            }
        }

        let by_host = [
            ("cnn.com", Country::Usa),
            ("nytimes.com", Country::Usa),
            ("washingtonpost.com", Country::Usa),
            ("foxnews.com", Country::Usa),
            ("bbc.com", Country::Uk),
            ("theguardian.com", Country::Uk),
            ("ndtv.com", Country::India),
            ("thehindu.com", Country::India),
            ("indiatimes.com", Country::India),
            ("rt.com", Country::Russia),
            ("dw.com", Country::Germany),
        ];
        for (domain, country) in by_host {
            if host == domain || host.ends_with(&format!(".{}", domain)) {
                return Some(country);
            }
        }

        None
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Country {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USA" => Ok(Country::Usa),
            "RUSSIA" => Ok(Country::Russia),
            "INDIA" => Ok(Country::India),
            "CHINA" => Ok(Country::China),
            "JAPAN" => Ok(Country::Japan),
            "UK" => Ok(Country::Uk),
            "GERMANY" => Ok(Country::Germany),
            "FRANCE" => Ok(Country::France),
            "BRAZIL" => Ok(Country::Brazil),
            "AUSTRALIA" => Ok(Country::Australia),
            other => Err(Error::InvalidInput(format!(
                "Unknown country code: {}",
                other
            ))),
        }
    }
}

/// The closed category set. Serialized as the 3-letter code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Pol,
    Eco,
    Soc,
    Tec,
    Env,
    Hea,
    Spo,
    Sec,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pol => "POL",
            Category::Eco => "ECO",
            Category::Soc => "SOC",
            Category::Tec => "TEC",
            Category::Env => "ENV",
            Category::Hea => "HEA",
            Category::Spo => "SPO",
            Category::Sec => "SEC",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Pol => "Politics",
            Category::Eco => "Economy",
            Category::Soc => "Society",
            Category::Tec => "Technology",
            Category::Env => "Environment",
            Category::Hea => "Health",
            Category::Spo => "Sports",
            Category::Sec => "Security",
        }
    }

    /// Total mapping from free-form model replies: anything outside the
    /// closed set becomes ECO.
    pub fn normalize(raw: &str) -> Category {
        raw.parse().unwrap_or(Category::Eco)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "POL" => Ok(Category::Pol),
            "ECO" => Ok(Category::Eco),
            "SOC" => Ok(Category::Soc),
            "TEC" => Ok(Category::Tec),
            "ENV" => Ok(Category::Env),
            "HEA" => Ok(Category::Hea),
            "SPO" => Ok(Category::Spo),
            "SEC" => Ok(Category::Sec),
            other => Err(Error::InvalidInput(format!(
                "Unknown category code: {}",
                other
            ))),
        }
    }
}

/// The human-readable composite identifier, e.g. `USA-ECO-2025-001`.
/// Unique per (country, category, year), strictly increasing within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DnaCode {
    pub country: Country,
    pub category: Category,
    pub year: i32,
    pub sequence: u32,
}

impl DnaCode {
    pub fn new(country: Country, category: Category, year: i32, sequence: u32) -> Self {
        Self {
            country,
            category,
            year,
            sequence,
        }
    }
}

impl fmt::Display for DnaCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{:03}",
            self.country.as_str(),
            self.category.as_str(),
            self.year,
            self.sequence
        )
    }
}

impl FromStr for DnaCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 4 {
            return Err(Error::InvalidInput(format!("Malformed DNA code: {}", s)));
        }
        let country = parts[0].parse()?;
        let category = parts[1].parse()?;
        let year = parts[2]
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Bad year in DNA code: {}", s)))?;
        let sequence = parts[3]
            .parse()
            .map_err(|_| Error::InvalidInput(format!("Bad sequence in DNA code: {}", s)))?;
        Ok(DnaCode {
            country,
            category,
            year,
            sequence,
        })
    }
}

impl TryFrom<String> for DnaCode {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DnaCode> for String {
    fn from(code: DnaCode) -> String {
        code.to_string()
    }
}

/// One ingested news item. Immutable once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub dna_code: DnaCode,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub source_url: String,
    pub published_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
    pub country: Country,
    pub category: Category,
    pub year: i32,
    pub sequence: u32,
    pub thread_id: String,
    pub parent_id: Option<String>,
}

/// A named continuity grouping of related articles over time. Country and
/// category reflect the first article; created lazily, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryThread {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub country: Country,
    pub category: Category,
    pub started_at: DateTime<Utc>,
    pub article_count: u32,
}
