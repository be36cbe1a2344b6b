//! Language code to language name resolution.
//!
//! The base table comes from `schema/languages.yaml`. A fixed set of manual
//! overrides for irregular and deprecated codes always wins over the file.

use crate::error::ConfigError;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

// Codes missing from the base table or written irregularly in etymologies
const MANUAL_OVERRIDES: &[(&str, &str)] = &[
    ("ln", "Lingala"),
    ("arh", "Arhuaco"),
    ("oto-otm-pro", "Proto-Otomi"),
    ("crp-mpp", "Macau Pidgin Portuguese"),
    ("kg", "Kongo"),
    ("omq-otp-pro", "Proto-Oto-Pamean"),
    ("ira-mid", "Middle Iranian"),
    ("ML", "Medieval Latin"),
    ("Medieval Greek", "Byzantine Greek"),
    ("aat", "Arvanitika Albanian"),
    ("fa-cls", "Classical Persian"),
    ("de-AT", "Austrian German"),
    ("BE.", "British English"),
    ("omq-mxt-pro", "Proto-Mixtec"),
    ("osc-luc", "Lucanian"),
    ("szy", "Sakizaya"),
    ("grc-aeo", "Aeolic Greek"),
    ("la-med", "Medieval Latin"),
    ("als", "Tosk Albanian"),
    ("la-ren", "Renaissance Latin"),
    ("la-lat", "Late Latin"),
    ("frc", "Cajun French"),
    ("oto-pro", "Proto-Otomian"),
    ("mkh-okm-A", "Angkorian Old Khmer"),
    ("hbo", "Biblical Hebrew"),
    ("os-pro", "Proto-Ossetic"),
    ("ONF.", "Old Northern French"),
    ("hi-mid", "Middle Hindi"),
    ("omq-zap-pro", "Proto-Zapotecan"),
    ("njz", "Nyishi"),
    ("mfr", "Marrithiyel"),
    ("de-CH", "Swiss High German"),
    ("iu", "Inuktitut"),
    ("it-oit", "Old Italian"),
    ("tl-cls", "Classical Tagalog"),
    ("roa-oit", "Old Italian"),
    ("tbq-lob-pro", "Proto-Lolo-Burmese"),
    ("bnt-cmn", "Proto-Bantu"),
    ("und-xnu", "Xiongnu"),
    ("teh", "Tehuelche"),
    ("gem-sue", "Suevic"),
    ("CF.", "Canadian French"),
    ("lng", "Lombardic"),
    ("prv", "Provençal"),
    ("prs", "Dari"),
    ("omq-tel", "Teposcolula Mixtec"),
    ("fiu-fin-pro ", "Proto-Finnic"),
    ("bat-pro", "Proto-Balto-Slavic"),
    ("fa-ira", "Iranian Persian"),
    ("xmn", "Manichaean Middle Persian"),
    ("inc-kam", "Kamarupi Prakrit"),
    ("xme-old", "Old Median"),
    ("VG.", "Viennese German"),
    ("AE.", "American English"),
    ("gkm", "Byzantine Greek"),
    ("sa-neo", "New Sanskrit"),
    ("arc-imp", "Imperial Aramaic"),
    ("tl-old", "Old Tagalog"),
    ("aib", "Aynu"),
    ("cop-boh", "Bohairic Coptic"),
    ("Late Latin", "Late Latin"),
    ("AG.", "Austrian German"),
    ("New Latin", "New Latin"),
    ("khi-kho-pro", "Proto-Khoe"),
    ("omq-tri-pro", "Proto-Trique"),
    ("Medieval Latin", "Medieval Latin"),
    ("asa", "Pare"),
    ("OIr.", "Old Iranian"),
    ("dwu", "Dhuwal"),
    ("fiu-pro", "Proto-Uralic"),
    ("fr-CH", "Switzerland French"),
    ("qwm", "Kipchak"),
    ("qfa-lic-pro", "Proto-Hlai"),
    ("fra-aca", "Acadian French"),
    ("nan-hok", "Hokkien"),
    ("es-MX", "Mexican Spanish"),
    ("aln", "Gheg Albanian"),
    ("non-oen", "Old East Norse"),
    ("nv ", "Navajo"),
    ("grc-dor", "Doric Greek"),
    ("sxu", "Upper Saxon"),
    ("fr-CA", "Canadian French"),
    ("xtg", "Transalpine Gaulish"),
    ("en-US", "American English"),
    ("xsc-pro", "Proto-Scythian"),
    ("la-new", "New Latin"),
    ("LL", "Late Latin"),
    ("la-vul", "Vulgar Latin"),
    ("nan-hai", "Hainanese"),
    ("mkh-okm-P", "Pre-Angkorian Old Khmer"),
    ("pt-BR", "Brazilian Portuguese"),
    ("omq-zpc-pro", "Proto-Zapotec"),
    ("omq-cha-pro", "Proto-Chatino"),
    ("und-idn", "Idiom Neutral"),
    ("goh-lng", "Lombardic"),
    ("sem-jar", "Jewish Aramaic"),
    ("xme-ker", "Kermanic"),
    ("sa-ved", "Vedic Sanskrit"),
    ("zhx", "Sinitic"),
    ("mkh-mmn", "Middle Mon"),
    ("bo", "Tibetan"),
    ("xln", "Alanic"),
    ("omq-teo", "Teojomulco Chatino"),
    ("ivb", "Ibatan"),
    ("sco-smi", "Middle Scots"),
    ("xyt", "Mayi-Thakurti"),
    ("non-own", "Old West Norse"),
    ("grc-att", "Attic Greek"),
    ("Koine", "Koine Greek"),
    ("xgn", "Mongolic"),
    ("ngf-pro", "Proto-Trans-New Guinea"),
    ("MIr.", "Middle Iranian"),
    ("grc-koi", "Koine Greek"),
    ("la-ecc", "Ecclesiastical Latin"),
    ("sco-osc", "Early Scots"),
    ("fro-pic", "Picard Old French"),
    ("xme-mid", "Middle Median"),
    ("bzj", "Belizean Creole"),
    ("tmr", "Jewish Babylonian Aramaic"),
    ("auc", "Huaorani"),
    ("ang-nor", "Northumbrian Old English"),
    ("es-lun", "Lunfardo"),
    ("RL.", "Renaissance Latin"),
    ("egy-lat", "Late Egyptian"),
    ("LL.", "Late Latin"),
    ("VL.", "Vulgar Latin"),
    ("NL.", "New Latin"),
    ("ML.", "Medieval Latin"),
    ("EL.", "Ecclesiastical Latin"),
    ("xno", "Anglo-Norman"),
    ("gmw-pro", "Proto-West Germanic"),
    ("trk-cmn", "Common Turkic"),
    ("urj-fpr-pro", "Proto-Finno-Permic"),
    ("xsc-sak-pro", "Proto-Saka"),
    ("ltc-lat", "Late Middle Chinese"),
    ("non-ogt", "Old Gutnish"),
    ("bnt-lal", "Lala (South Africa)"),
    ("bdm", "Buduma"),
    ("zlw-slv", "Slovincian"),
    ("zle-oru", "Old Russian"),
    ("emb", "Embaloh"),
    ("bas", "Basaa"),
    ("mfi", "Wandala"),
    ("ser", "Serrano"),
    ("ahr", "Ahirani"),
    ("wrk", "Garawa"),
    (" az", "Azerbaijani"),
    ("abb", "Bankon"),
    ("de ", "German"),
    ("xsc-skw-pro", "Proto-Saka-Wakhi"),
    ("inc-psu", "Sauraseni Prakrit"),
    ("sa ", "Sanskrit"),
    ("qfa-adm-pro", "Proto-Great Andamanese"),
];

static OVERRIDES: Lazy<HashMap<String, String>> = Lazy::new(|| {
    MANUAL_OVERRIDES
        .iter()
        .map(|(code, name)| (code.trim().to_string(), name.to_string()))
        .collect()
});

#[derive(Debug, Deserialize)]
struct LanguagesSchema {
    languages: HashMap<String, String>,
}

/// Code -> name table, passed explicitly to whatever needs it.
#[derive(Debug, Clone, Default)]
pub struct LanguageTable {
    names: HashMap<String, String>,
}

impl LanguageTable {
    /// Only the manual overrides, no base table.
    pub fn overrides_only() -> Self {
        Self::from_map(HashMap::new())
    }

    /// Base entries with the manual overrides applied on top.
    pub fn from_map(base: HashMap<String, String>) -> Self {
        let mut names: HashMap<String, String> = base
            .into_iter()
            .map(|(code, name)| (code.trim().to_string(), name))
            .collect();
        for (code, name) in OVERRIDES.iter() {
            names.insert(code.clone(), name.clone());
        }
        LanguageTable { names }
    }

    pub fn from_yaml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let schema: LanguagesSchema =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_map(schema.languages))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_yaml_str(&contents, path)?;
        debug!(path = %path.display(), languages = table.len(), "loaded language table");
        Ok(table)
    }

    /// Load from `path`, or from the default schema location when `None`.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Self::load(&find_schema_file("languages.yaml")?),
        }
    }

    /// Name for a code. Surrounding whitespace on the code is ignored.
    pub fn resolve(&self, code: &str) -> Option<&str> {
        self.names.get(code.trim()).map(String::as_str)
    }

    pub fn insert(&mut self, code: impl Into<String>, name: impl Into<String>) {
        self.names.insert(code.into().trim().to_string(), name.into());
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Look for `schema/<filename>` relative to the working directory or two levels up.
pub fn find_schema_file(filename: &str) -> Result<PathBuf, ConfigError> {
    let candidates = [
        PathBuf::from(format!("schema/{}", filename)),
        PathBuf::from(format!("../../schema/{}", filename)),
    ];
    candidates
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| ConfigError::NotFound(filename.to_string()))
}

#[cfg(test)]
mod languages_tests {
    use super::*;

    #[test]
    fn overrides_always_present() {
        let table = LanguageTable::overrides_only();
        assert_eq!(table.resolve("VL."), Some("Vulgar Latin"));
        assert_eq!(table.resolve("LL."), Some("Late Latin"));
        assert_eq!(table.resolve("gmw-pro"), Some("Proto-West Germanic"));
        assert_eq!(table.resolve("la-vul"), Some("Vulgar Latin"));
    }

    #[test]
    fn lookup_trims_code() {
        let table = LanguageTable::overrides_only();
        // punctuation repair turns "VL.|" into "VL. |"
        assert_eq!(table.resolve("VL. "), Some("Vulgar Latin"));
        // override keys with stray spaces still resolve
        assert_eq!(table.resolve("nv"), Some("Navajo"));
        assert_eq!(table.resolve("az"), Some("Azerbaijani"));
    }

    #[test]
    fn overrides_win_over_base() {
        let mut base = HashMap::new();
        base.insert("en".to_string(), "English".to_string());
        base.insert("ML".to_string(), "Malayalam?".to_string());
        let table = LanguageTable::from_map(base);
        assert_eq!(table.resolve("en"), Some("English"));
        assert_eq!(table.resolve("ML"), Some("Medieval Latin"));
    }

    #[test]
    fn yaml_table() {
        let yaml = "languages:\n  en: English\n  enm: Middle English\n  fro: Old French\n";
        let table = LanguageTable::from_yaml_str(yaml, Path::new("inline.yaml")).unwrap();
        assert_eq!(table.resolve("enm"), Some("Middle English"));
        assert_eq!(table.resolve("zz"), None);
        assert!(table.len() > 3);
    }

    #[test]
    fn bad_yaml_is_config_error() {
        let err = LanguageTable::from_yaml_str("languages: [", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = LanguageTable::load(Path::new("/nonexistent/languages.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
