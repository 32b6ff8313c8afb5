//! Marketplace sites and their login hosts.

// self
use crate::_prelude::*;

/// Country marketplace selecting the host users log in on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Site {
	/// Argentina.
	Mla,
	/// Brazil.
	Mlb,
	/// Colombia.
	Mco,
	/// Costa Rica.
	Mcr,
	/// Ecuador.
	Mec,
	/// Chile.
	Mlc,
	/// Mexico.
	Mlm,
	/// Uruguay.
	Mlu,
	/// Venezuela.
	Mlv,
	/// Panama.
	Mpa,
	/// Peru.
	Mpe,
	/// Portugal.
	Mpt,
	/// Dominican Republic.
	Mrd,
	/// Cross-border trade (global selling).
	Cbt,
}
impl Site {
	/// Every supported site, in catalogue order.
	pub const ALL: [Site; 14] = [
		Site::Mla,
		Site::Mlb,
		Site::Mco,
		Site::Mcr,
		Site::Mec,
		Site::Mlc,
		Site::Mlm,
		Site::Mlu,
		Site::Mlv,
		Site::Mpa,
		Site::Mpe,
		Site::Mpt,
		Site::Mrd,
		Site::Cbt,
	];

	/// Returns the site code (`MLA`, `MLB`, ...).
	pub const fn as_str(self) -> &'static str {
		match self {
			Site::Mla => "MLA",
			Site::Mlb => "MLB",
			Site::Mco => "MCO",
			Site::Mcr => "MCR",
			Site::Mec => "MEC",
			Site::Mlc => "MLC",
			Site::Mlm => "MLM",
			Site::Mlu => "MLU",
			Site::Mlv => "MLV",
			Site::Mpa => "MPA",
			Site::Mpe => "MPE",
			Site::Mpt => "MPT",
			Site::Mrd => "MRD",
			Site::Cbt => "CBT",
		}
	}

	/// Returns the base URL of the site's login host.
	pub const fn auth_base(self) -> &'static str {
		match self {
			Site::Mla => "https://auth.mercadolibre.com.ar",
			Site::Mlb => "https://auth.mercadolivre.com.br",
			Site::Mco => "https://auth.mercadolibre.com.co",
			Site::Mcr => "https://auth.mercadolibre.com.cr",
			Site::Mec => "https://auth.mercadolibre.com.ec",
			Site::Mlc => "https://auth.mercadolibre.cl",
			Site::Mlm => "https://auth.mercadolibre.com.mx",
			Site::Mlu => "https://auth.mercadolibre.com.uy",
			Site::Mlv => "https://auth.mercadolibre.com.ve",
			Site::Mpa => "https://auth.mercadolibre.com.pa",
			Site::Mpe => "https://auth.mercadolibre.com.pe",
			Site::Mpt => "https://auth.mercadolibre.com.pt",
			Site::Mrd => "https://auth.mercadolibre.com.do",
			Site::Cbt => "https://global-selling.mercadolibre.com",
		}
	}
}
impl Display for Site {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Site {
	type Err = SiteParseError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let code = s.trim();

		Self::ALL
			.into_iter()
			.find(|site| site.as_str().eq_ignore_ascii_case(code))
			.ok_or_else(|| SiteParseError { code: code.to_owned() })
	}
}
impl TryFrom<String> for Site {
	type Error = SiteParseError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<Site> for &'static str {
	fn from(site: Site) -> Self {
		site.as_str()
	}
}

/// Raised when a site code is not part of the catalogue.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown MercadoLibre site code: {code}.")]
pub struct SiteParseError {
	/// Rejected code.
	pub code: String,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_codes_case_insensitively() {
		assert_eq!("mlb".parse::<Site>(), Ok(Site::Mlb));
		assert_eq!(" CBT ".parse::<Site>(), Ok(Site::Cbt));
		assert_eq!(
			"XYZ".parse::<Site>(),
			Err(SiteParseError { code: "XYZ".into() })
		);
	}

	#[test]
	fn every_site_round_trips_through_its_code() {
		for site in Site::ALL {
			assert_eq!(site.to_string().parse::<Site>(), Ok(site));
			assert!(site.auth_base().starts_with("https://"));
		}

		assert_eq!(Site::Mlc.auth_base(), "https://auth.mercadolibre.cl");
		assert_eq!(Site::Cbt.auth_base(), "https://global-selling.mercadolibre.com");
	}

	#[test]
	fn serde_uses_site_codes() {
		let json = serde_json::to_string(&Site::Mlm).expect("Site should serialize.");

		assert_eq!(json, "\"MLM\"");

		let site: Site = serde_json::from_str("\"mla\"").expect("Lowercase code should deserialize.");

		assert_eq!(site, Site::Mla);
	}
}
