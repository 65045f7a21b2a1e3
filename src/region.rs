//! Per-region behaviour.
//!
//! Each newspaper edition prints its classified pages differently: the start
//! code, the keywords that identify judicial-auction blocks, whether a
//! category legend crosses the top of the section, whether the start code
//! can be read in a plain OCR pass. A [`RegionProfile`] carries all of that
//! as data and [`create_strategy`] turns it into a [`RegionStrategy`],
//! selected once per run.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::config::SegmentationConfig;
use crate::error::{Error, Result};
use crate::layout::{KeywordSet, LegendStripper};
use crate::ocr::{OcrEngine, OcrOutput};
use crate::section::{
    SectionPatterns, SpatialAnchor, SpatialCoDetector, StartDetector, StartMatch,
    TextMatchDetector,
};

/// What to do when the start code never appears in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Emit no columns
    #[default]
    EmitNothing,
    /// Emit every raw column of the run, untagged
    PassThrough,
}

/// Start detection strategy of a region.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DetectorKind {
    /// Plain OCR text match on the column
    #[default]
    TextMatch,
    /// Inverted patch beside an anchor word
    Spatial(SpatialAnchor),
}

/// Everything that varies between newspaper editions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionProfile {
    /// Region identifier
    pub name: String,
    /// Code opening the section
    pub start_code: String,
    /// Case-insensitive pattern for the start code, tolerant of OCR confusions
    pub start_pattern: String,
    /// Two-digit family of closing codes; defaults to the start code's
    pub end_family: Option<String>,
    /// Closing-family code that never ends the section; defaults to the
    /// start code
    pub end_excluded: Option<String>,
    /// Keywords marking a block as part of the target category
    pub include_keywords: Vec<String>,
    /// Keywords of unrelated categories printed beside the target one
    pub exclude_keywords: Vec<String>,
    /// Category legend tokens; empty when the region prints no legend
    pub legend_tokens: Vec<String>,
    /// Start detection strategy
    pub detector: DetectorKind,
    /// Behaviour when the start code never appears
    pub fallback: FallbackPolicy,
    /// Words that make a code line a section title
    pub title_words: Vec<String>,
    /// Address/locator words preceding codes that are not titles
    pub locator_words: Vec<String>,
    /// Markers that never occur in a title line
    pub blocked_symbols: Vec<String>,
    /// Line patterns removed from recognised text (mastheads, pagination)
    pub furniture_patterns: Vec<String>,
    /// Tunables for this region
    pub config: SegmentationConfig,
}

impl Default for RegionProfile {
    fn default() -> Self {
        Self::valparaiso()
    }
}

/// Family of the section codes that close the auctions in every edition.
const CLOSING_FAMILY: &str = "16";

/// Judicial auctions inside the closing family.
const AUCTIONS_CODE: &str = "1612";

const INCLUDE_KEYWORDS: &[&str] = &["REMATE", "JUZGADO", "EXTRACTO", "JUDICIAL"];

const EXCLUDE_KEYWORDS: &[&str] =
    &["NECROLOGICOS", "FUNEBRES", "CONDOLENCIAS", "DEFUNCIONES", "IN MEMORIAM"];

const LEGEND_TOKENS: &[&str] = &[
    "PROPIEDADES",
    "VEHICULOS",
    "AGRICOLAS",
    "INDUSTRIAS",
    "NEGOCIOS",
    "LEGALES",
    "100-200",
    "300",
    "400-500",
];

const TITLE_WORDS: &[&str] = &[
    "CITAN",
    "REUNION",
    "INSTITUCIONES",
    "PROPIEDADES",
    "VEHICULOS",
    "VARIOS",
    "JUDICIALES",
    "DEPORTES",
    "EMPLEOS",
    "CITANAREUNION",
];

const LOCATOR_WORDS: &[&str] = &[
    "calle", "av", "avenida", "psje", "pasaje", "casa", "depto", "block", "sitio", "lote", "rol",
    "fojas", "numero", "nro", "n°",
];

const BLOCKED_SYMBOLS: &[&str] = &["$", "UF", "UTM", "@", "www"];

const PAGINATION_PATTERN: &str = r"(?i)^\s*(P[áa]gina|P[áa]g\.?)\s*\d+\s*$";

const DATE_HEADER_PATTERN: &str = r"(?i).*\|\s*(lunes|martes|mi[ée]rcoles|jueves|viernes|s[áa]bado|domingo)\s+\d{1,2}\s+de\s+[a-z]+\s+de\s+\d{4}";

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl RegionProfile {
    /// El Mercurio de Valparaíso.
    pub fn valparaiso() -> Self {
        Self {
            name: "valparaiso".to_string(),
            start_code: "1612".to_string(),
            start_pattern: "(1612|I612|l6l2|161Z)".to_string(),
            end_family: Some(CLOSING_FAMILY.to_string()),
            end_excluded: None,
            include_keywords: strings(INCLUDE_KEYWORDS),
            exclude_keywords: Vec::new(),
            legend_tokens: Vec::new(),
            detector: DetectorKind::TextMatch,
            fallback: FallbackPolicy::EmitNothing,
            title_words: strings(TITLE_WORDS),
            locator_words: strings(LOCATOR_WORDS),
            blocked_symbols: strings(BLOCKED_SYMBOLS),
            furniture_patterns: vec![
                r"(?i)^\s*EL\s+MERCURIO\s+DE\s+VALPARA[ÍI]SO\s*$".to_string(),
                r"(?i)EL\s+MERCURIO\s+DE\s+VALPARA[ÍI]SO\s*\|".to_string(),
                PAGINATION_PATTERN.to_string(),
                DATE_HEADER_PATTERN.to_string(),
            ],
            config: SegmentationConfig::default(),
        }
    }

    /// El Mercurio de Antofagasta: dense pages, a category legend, and
    /// obituaries printed beside the auctions.
    pub fn antofagasta() -> Self {
        let mut config = SegmentationConfig::default();
        config.block.kernel_width = 15;
        config.block.kernel_height = 12;
        config.block.erase_furniture = true;

        let mut include = strings(INCLUDE_KEYWORDS);
        include.extend(strings(&["PRIMER", "SEGUNDO", "TERCER"]));

        Self {
            name: "antofagasta".to_string(),
            start_code: "1312".to_string(),
            start_pattern: "(1312|I312|l3l2)".to_string(),
            end_excluded: Some(AUCTIONS_CODE.to_string()),
            include_keywords: include,
            exclude_keywords: strings(EXCLUDE_KEYWORDS),
            legend_tokens: strings(LEGEND_TOKENS),
            furniture_patterns: vec![
                r"(?i)^\s*EL\s+MERCURIO\s+DE\s+ANTOFAGASTA\s*$".to_string(),
                PAGINATION_PATTERN.to_string(),
                DATE_HEADER_PATTERN.to_string(),
            ],
            config,
            ..Self::valparaiso()
        }
    }

    /// El Sur de Concepción: the code is printed reversed beside the
    /// section name, and start detection is unreliable enough that raw
    /// columns are passed through when it fails.
    pub fn concepcion() -> Self {
        Self {
            name: "concepcion".to_string(),
            start_pattern: "(1612|I612|l6l2|1512)".to_string(),
            detector: DetectorKind::Spatial(SpatialAnchor::default()),
            fallback: FallbackPolicy::PassThrough,
            furniture_patterns: vec![
                r"(?i)^\s*EL\s+SUR\s*$".to_string(),
                PAGINATION_PATTERN.to_string(),
                DATE_HEADER_PATTERN.to_string(),
            ],
            ..Self::valparaiso()
        }
    }

    /// Look up a built-in profile by name.
    pub fn builtin(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "valparaiso" => Ok(Self::valparaiso()),
            "antofagasta" => Ok(Self::antofagasta()),
            "concepcion" => Ok(Self::concepcion()),
            other => Err(Error::InvalidRegion(format!("unknown region: {}", other))),
        }
    }

    /// Parse a profile from JSON; missing fields take Valparaíso values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let profile: RegionProfile = serde_json::from_str(json)?;
        profile.config.validate()?;
        Ok(profile)
    }

    /// Keywords for block classification.
    pub fn keywords(&self) -> KeywordSet {
        KeywordSet::new(&self.include_keywords, &self.exclude_keywords)
    }

    /// Compile the section patterns.
    pub fn patterns(&self) -> Result<SectionPatterns> {
        let mut patterns =
            SectionPatterns::new(&self.start_code, &self.start_pattern, self.end_family.as_deref())?
                .with_title_words(&self.title_words)
                .with_locator_words(&self.locator_words)
                .with_blocked_symbols(&self.blocked_symbols)
                .with_max_title_len(self.config.section.max_title_len);
        if let Some(code) = &self.end_excluded {
            patterns = patterns.with_excluded_end_code(code);
        }
        Ok(patterns)
    }
}

/// Region-specific behaviour of the pipeline.
pub trait RegionStrategy {
    /// Region name for logging.
    fn name(&self) -> &str;

    /// Profile the strategy was built from.
    fn profile(&self) -> &RegionProfile;

    /// Compiled start/end patterns.
    fn patterns(&self) -> &SectionPatterns;

    /// Look for the start code in a column whose OCR output is `recognized`.
    fn detect_start(
        &self,
        column: &GrayImage,
        recognized: &OcrOutput,
        ocr: &dyn OcrEngine,
    ) -> Result<Option<StartMatch>>;

    /// Legend stripper, when the region prints a category legend.
    fn detect_legend(&self) -> Option<&LegendStripper>;

    /// Behaviour when the start code never appears.
    fn fallback_policy(&self) -> FallbackPolicy;
}

/// Strategy driven entirely by a [`RegionProfile`].
pub struct ProfileStrategy {
    profile: RegionProfile,
    patterns: SectionPatterns,
    detector: Box<dyn StartDetector + Send + Sync>,
    legend: Option<LegendStripper>,
}

impl std::fmt::Debug for ProfileStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileStrategy")
            .field("region", &self.profile.name)
            .field("detector", &self.detector.name())
            .field("legend", &self.legend.is_some())
            .finish()
    }
}

impl RegionStrategy for ProfileStrategy {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn profile(&self) -> &RegionProfile {
        &self.profile
    }

    fn patterns(&self) -> &SectionPatterns {
        &self.patterns
    }

    fn detect_start(
        &self,
        column: &GrayImage,
        recognized: &OcrOutput,
        ocr: &dyn OcrEngine,
    ) -> Result<Option<StartMatch>> {
        self.detector.detect(column, recognized, ocr, &self.patterns)
    }

    fn detect_legend(&self) -> Option<&LegendStripper> {
        self.legend.as_ref()
    }

    fn fallback_policy(&self) -> FallbackPolicy {
        self.profile.fallback
    }
}

/// Build the strategy for `profile`, compiling its patterns.
pub fn create_strategy(profile: RegionProfile) -> Result<Box<dyn RegionStrategy + Send + Sync>> {
    let patterns = profile.patterns()?;
    let detector: Box<dyn StartDetector + Send + Sync> = match &profile.detector {
        DetectorKind::TextMatch => Box::new(TextMatchDetector),
        DetectorKind::Spatial(anchor) => {
            if anchor.word.trim().is_empty() {
                return Err(Error::InvalidRegion(format!(
                    "region {} uses spatial detection without an anchor word",
                    profile.name
                )));
            }
            Box::new(SpatialCoDetector::new(anchor.clone()))
        },
    };
    let legend = if profile.legend_tokens.is_empty() {
        None
    } else {
        Some(LegendStripper::new(profile.config.legend.clone(), &profile.legend_tokens))
    };

    log::debug!(
        "region {}: start detector {}, legend {}, fallback {:?}",
        profile.name,
        detector.name(),
        legend.is_some(),
        profile.fallback
    );
    Ok(Box::new(ProfileStrategy {
        profile,
        patterns,
        detector,
        legend,
    }))
}
