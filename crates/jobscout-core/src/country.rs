//! Static country table.
//!
//! Built once at compile time and queried by normalised alias. Each entry
//! carries the Indeed sub-domain (optionally `subdomain:API_CODE`) and the
//! Glassdoor domain suffix (optionally `subdomain:suffix`) where the site
//! operates in that country.

use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub struct Country {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    indeed_domain: &'static str,
    glassdoor_domain: Option<&'static str>,
}

const fn c(
    name: &'static str,
    aliases: &'static [&'static str],
    indeed_domain: &'static str,
    glassdoor_domain: Option<&'static str>,
) -> Country {
    Country {
        name,
        aliases,
        indeed_domain,
        glassdoor_domain,
    }
}

static COUNTRIES: &[Country] = &[
    c("ARGENTINA", &["argentina"], "ar", Some("com.ar")),
    c("AUSTRALIA", &["australia"], "au", Some("com.au")),
    c("AUSTRIA", &["austria"], "at", Some("at")),
    c("BAHRAIN", &["bahrain"], "bh", None),
    c("BANGLADESH", &["bangladesh"], "bd", None),
    c("BELGIUM", &["belgium"], "be", Some("fr:be")),
    c("BULGARIA", &["bulgaria"], "bg", None),
    c("BRAZIL", &["brazil"], "br", Some("com.br")),
    c("CANADA", &["canada"], "ca", Some("ca")),
    c("CHILE", &["chile"], "cl", None),
    c("CHINA", &["china"], "cn", None),
    c("COLOMBIA", &["colombia"], "co", None),
    c("COSTARICA", &["costa rica"], "cr", None),
    c("CROATIA", &["croatia"], "hr", None),
    c("CYPRUS", &["cyprus"], "cy", None),
    c("CZECHREPUBLIC", &["czech republic", "czechia"], "cz", None),
    c("DENMARK", &["denmark"], "dk", None),
    c("ECUADOR", &["ecuador"], "ec", None),
    c("EGYPT", &["egypt"], "eg", None),
    c("ESTONIA", &["estonia"], "ee", None),
    c("FINLAND", &["finland"], "fi", None),
    c("FRANCE", &["france"], "fr", Some("fr")),
    c("GERMANY", &["germany"], "de", Some("de")),
    c("GREECE", &["greece"], "gr", None),
    c("HONGKONG", &["hong kong"], "hk", Some("com.hk")),
    c("HUNGARY", &["hungary"], "hu", None),
    c("INDIA", &["india"], "in", Some("co.in")),
    c("INDONESIA", &["indonesia"], "id", None),
    c("IRELAND", &["ireland"], "ie", Some("ie")),
    c("ISRAEL", &["israel"], "il", None),
    c("ITALY", &["italy"], "it", Some("it")),
    c("JAPAN", &["japan"], "jp", None),
    c("KUWAIT", &["kuwait"], "kw", None),
    c("LATVIA", &["latvia"], "lv", None),
    c("LITHUANIA", &["lithuania"], "lt", None),
    c("LUXEMBOURG", &["luxembourg"], "lu", None),
    c("MALAYSIA", &["malaysia"], "malaysia:my", Some("com")),
    c("MALTA", &["malta"], "malta:mt", Some("mt")),
    c("MEXICO", &["mexico"], "mx", Some("com.mx")),
    c("MOROCCO", &["morocco"], "ma", None),
    c("NETHERLANDS", &["netherlands"], "nl", Some("nl")),
    c("NEWZEALAND", &["new zealand"], "nz", Some("co.nz")),
    c("NIGERIA", &["nigeria"], "ng", None),
    c("NORWAY", &["norway"], "no", None),
    c("OMAN", &["oman"], "om", None),
    c("PAKISTAN", &["pakistan"], "pk", None),
    c("PANAMA", &["panama"], "pa", None),
    c("PERU", &["peru"], "pe", None),
    c("PHILIPPINES", &["philippines"], "ph", None),
    c("POLAND", &["poland"], "pl", None),
    c("PORTUGAL", &["portugal"], "pt", None),
    c("QATAR", &["qatar"], "qa", None),
    c("ROMANIA", &["romania"], "ro", None),
    c("SAUDIARABIA", &["saudi arabia"], "sa", None),
    c("SINGAPORE", &["singapore"], "sg", Some("sg")),
    c("SLOVAKIA", &["slovakia"], "sk", None),
    c("SLOVENIA", &["slovenia"], "sl", None),
    c("SOUTHAFRICA", &["south africa"], "za", None),
    c("SOUTHKOREA", &["south korea"], "kr", None),
    c("SPAIN", &["spain"], "es", Some("es")),
    c("SWEDEN", &["sweden"], "se", None),
    c("SWITZERLAND", &["switzerland"], "ch", Some("de:ch")),
    c("TAIWAN", &["taiwan"], "tw", None),
    c("THAILAND", &["thailand"], "th", None),
    c("TURKEY", &["türkiye", "turkey"], "tr", None),
    c("UKRAINE", &["ukraine"], "ua", None),
    c("UNITEDARABEMIRATES", &["united arab emirates"], "ae", None),
    c("UK", &["uk", "united kingdom"], "uk:gb", Some("co.uk")),
    c("USA", &["usa", "us", "united states"], "www:us", Some("com")),
    c("URUGUAY", &["uruguay"], "uy", None),
    c("VENEZUELA", &["venezuela"], "ve", None),
    c("VIETNAM", &["vietnam"], "vn", Some("com")),
    c("US_CANADA", &["usa/ca"], "www", None),
    c("WORLDWIDE", &["worldwide"], "www", None),
];

impl Country {
    pub fn all() -> &'static [Country] {
        COUNTRIES
    }

    /// Looks a country up by any of its aliases, case-insensitively.
    pub fn from_alias(alias: &str) -> Option<&'static Country> {
        let normalized = alias.trim().to_lowercase();
        COUNTRIES
            .iter()
            .find(|country| country.aliases.contains(&normalized.as_str()))
    }

    pub fn usa() -> &'static Country {
        Self::by_name("USA")
    }

    pub fn worldwide() -> &'static Country {
        Self::by_name("WORLDWIDE")
    }

    fn by_name(name: &str) -> &'static Country {
        COUNTRIES
            .iter()
            .find(|country| country.name == name)
            .unwrap_or(&COUNTRIES[COUNTRIES.len() - 1])
    }

    pub fn is_usa(&self) -> bool {
        self.name == "USA"
    }

    pub fn display_name(&self) -> &'static str {
        self.aliases.first().copied().unwrap_or(self.name)
    }

    /// `(subdomain, API country code)` for Indeed.
    pub fn indeed_domain(&self) -> (&'static str, String) {
        match self.indeed_domain.split_once(':') {
            Some((subdomain, code)) => (subdomain, code.to_uppercase()),
            None => (self.indeed_domain, self.indeed_domain.to_uppercase()),
        }
    }

    /// Full Glassdoor host, if Glassdoor operates in this country.
    pub fn glassdoor_host(&self) -> Option<String> {
        let domain = self.glassdoor_domain?;
        Some(match domain.split_once(':') {
            Some((subdomain, suffix)) => format!("{subdomain}.glassdoor.{suffix}"),
            None => format!("www.glassdoor.{domain}"),
        })
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
