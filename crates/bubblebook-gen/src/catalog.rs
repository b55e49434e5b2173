//! Prompt catalog and shared generation parameters
//!
//! The catalog is the single source of truth for what each page of the book
//! should look like. It is built once at startup (from the built-in story or
//! from `generation_config.json`) and handed to the persister and the driver.

use bubblebook_core::{BookError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sampling parameters shared by every page unless overridden per call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    #[serde(rename = "cfg_scale")]
    pub guidance_scale: f32,
    #[serde(rename = "sampler")]
    pub sampler_name: String,
    pub batch_size: u32,
    /// `-1` picks a fresh random seed for every call
    pub seed: i64,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            steps: 50,
            guidance_scale: 7.5,
            sampler_name: "euler_a".to_string(),
            batch_size: 1,
            seed: -1,
        }
    }
}

impl GenerationParameters {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BookError::ValidationError(format!(
                "image dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.steps == 0 {
            return Err(BookError::ValidationError("steps must be positive".to_string()));
        }
        if self.guidance_scale.is_nan() || self.guidance_scale <= 0.0 {
            return Err(BookError::ValidationError(format!(
                "guidance scale must be positive, got {}",
                self.guidance_scale
            )));
        }
        if self.batch_size == 0 {
            return Err(BookError::ValidationError("batch_size must be positive".to_string()));
        }
        if self.seed < -1 {
            return Err(BookError::ValidationError(format!(
                "seed must be -1 (random) or non-negative, got {}",
                self.seed
            )));
        }
        Ok(())
    }

    /// Whether every call should draw its own seed
    pub fn is_random_seed(&self) -> bool {
        self.seed < 0
    }

    /// The seed to use for one sampling pass
    pub fn resolve_seed(&self) -> i64 {
        if self.is_random_seed() {
            i64::from(rand::random::<u32>())
        } else {
            self.seed
        }
    }
}

/// Positive/negative prompt text as stored in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPair {
    #[serde(rename = "prompt")]
    pub positive: String,
    #[serde(rename = "negative")]
    pub negative: String,
}

/// One page's prompts, keyed by its page id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptEntry {
    pub page_id: String,
    pub positive_prompt: String,
    pub negative_prompt: String,
}

/// Ordered page id -> prompt mapping plus the parameters shared by all pages.
///
/// Serializes to the `generation_config.json` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptCatalog {
    #[serde(rename = "generation_config", default)]
    pub parameters: GenerationParameters,
    pub illustrations: IndexMap<String, PromptPair>,
    #[serde(default)]
    pub model_recommendations: Vec<String>,
    #[serde(default)]
    pub style_tags: Vec<String>,
}

impl PromptCatalog {
    /// An empty catalog with default parameters and style tags
    pub fn empty() -> Self {
        Self {
            parameters: GenerationParameters::default(),
            illustrations: IndexMap::new(),
            model_recommendations: default_model_recommendations(),
            style_tags: default_style_tags(),
        }
    }

    /// The thirteen illustrations of the bubble story
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for (page_id, positive, negative) in BUILTIN_PROMPTS {
            catalog.insert(page_id, positive, negative);
        }
        catalog
    }

    /// Load from `generation_config.json`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: PromptCatalog = serde_json::from_str(&content).map_err(|e| {
            BookError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        catalog.parameters.validate()?;
        Ok(catalog)
    }

    /// Load from `path` when it exists, otherwise fall back to the built-in story
    pub fn load_or_builtin(path: &Path) -> Result<Self> {
        if path.exists() {
            let catalog = Self::load(path)?;
            tracing::info!(count = catalog.len(), path = %path.display(), "loaded prompt catalog");
            Ok(catalog)
        } else {
            tracing::info!("using built-in prompt catalog");
            Ok(Self::builtin())
        }
    }

    pub fn insert(&mut self, page_id: &str, positive: &str, negative: &str) {
        self.illustrations.insert(
            page_id.to_string(),
            PromptPair {
                positive: positive.to_string(),
                negative: negative.to_string(),
            },
        );
    }

    pub fn get(&self, page_id: &str) -> Option<PromptEntry> {
        self.illustrations.get(page_id).map(|pair| PromptEntry {
            page_id: page_id.to_string(),
            positive_prompt: pair.positive.clone(),
            negative_prompt: pair.negative.clone(),
        })
    }

    pub fn contains(&self, page_id: &str) -> bool {
        self.illustrations.contains_key(page_id)
    }

    /// Entries in catalog order
    pub fn entries(&self) -> impl Iterator<Item = PromptEntry> + '_ {
        self.illustrations.iter().map(|(page_id, pair)| PromptEntry {
            page_id: page_id.clone(),
            positive_prompt: pair.positive.clone(),
            negative_prompt: pair.negative.clone(),
        })
    }

    pub fn page_ids(&self) -> impl Iterator<Item = &str> {
        self.illustrations.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.illustrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.illustrations.is_empty()
    }

    /// The checkpoint the batch scripts default to
    pub fn primary_model(&self) -> &str {
        self.model_recommendations
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_CHECKPOINT)
    }
}

pub const DEFAULT_CHECKPOINT: &str = "dreamshaper_8.safetensors";

fn default_model_recommendations() -> Vec<String> {
    [
        DEFAULT_CHECKPOINT,
        "deliberate_v2.safetensors",
        "anything-v5.0.safetensors",
        "realisticVisionV60B1_v60B1VAE.safetensors",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_style_tags() -> Vec<String> {
    [
        "children's book illustration",
        "soft watercolor",
        "gentle colors",
        "pastel colors",
        "dreamy atmosphere",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

const BUILTIN_PROMPTS: [(&str, &str, &str); 13] = [
    (
        "cover",
        "A large transparent soap bubble floating in soft sky blue gradient background, rainbow prismatic edges, gentle watercolor illustration style, children's book cover, cute bubble with friendly expression, dreamy atmosphere, soft lighting, pastel colors, 20cm x 20cm square format",
        "dark, scary, sharp edges, complex details, adult themes",
    ),
    (
        "page_01_birth",
        "Cute cartoon bubble blower machine with smiley face, transparent soap bubble flying out with dotted trail lines, pure white background, gentle watercolor style, children's illustration, soft pastel colors, playful atmosphere, bubble trajectory arrows, friendly cartoon style",
        "dark background, sharp edges, realistic photography, complex machinery",
    ),
    (
        "page_02_mirror",
        "Transparent soap bubble looking at oval mirror with classical frame, reflection of bubble in mirror with faded colors and dotted border, surprised and happy bubble expressions, round speech bubbles, soft watercolor illustration, gentle lighting, children's book style",
        "realistic mirror, dark reflections, sharp edges, adult themes",
    ),
    (
        "page_03_world",
        "Large transparent soap bubble in center of page, rainbow spectrum flowing inside bubble, flowing wind lines surrounding outside, clear boundary line slightly thickened, soft watercolor style, gentle gradient colors, children's illustration, dreamy atmosphere",
        "dark colors, sharp boundaries, realistic physics, complex details",
    ),
    (
        "page_04_expanding",
        "Expanding soap bubble with multiple bubble contours showing growth process, outward spreading dynamic lines, boundary gradually thinning, tension building effect, deeper colors and dense lines, soft watercolor illustration, children's book style, gentle expansion",
        "explosive, violent, sharp edges, dark tension, scary expansion",
    ),
    (
        "page_05_burst",
        "Explosive burst effect with colorful rainbow fragments scattering in all directions, spiral wind vortex lines, dynamic tilted composition, soap bubble breaking moment, soft watercolor style, gentle explosion, children's illustration, colorful chaos",
        "violent explosion, sharp fragments, dark colors, scary elements",
    ),
    (
        "page_06_new_bubble",
        "New transparent soap bubble with happy smiley face, bright colors showing new beginning, same design as page 1 but with added smile, gentle watercolor style, children's illustration, hopeful atmosphere, soft lighting, rebirth theme",
        "dark rebirth, sad expression, sharp edges, complex details",
    ),
    (
        "page_07_friends",
        "Group of 3-5 soap bubbles in different sizes, each with unique rainbow colors inside, naturally scattered arrangement maintaining visual balance, each bubble with individual characteristics, soft watercolor style, children's illustration, friendly group scene",
        "crowded, chaotic arrangement, dark colors, sharp edges, too many bubbles",
    ),
    (
        "page_08_hug",
        "Two soap bubbles gently touching with overlapping boundaries, blurred boundary effect using dotted lines and faded colors, heart symbol at contact point, confused questioning expressions on bubbles, soft watercolor style, children's illustration, gentle contact",
        "violent collision, sharp contact, dark emotions, complex physics",
    ),
    (
        "page_09_merge",
        "Two soap bubbles merging into one large bubble with arrow showing transformation, mixed rainbow colors inside large bubble, newly drawn clear boundary, soft watercolor style, children's illustration, gentle fusion process, unity theme",
        "violent merger, sharp transformation, dark fusion, complex physics",
    ),
    (
        "page_10_thinking",
        "Single soap bubble floating quietly with thinking expression, small thought bubbles surrounding large bubble, calm colors and peaceful composition, contemplative atmosphere, soft watercolor style, children's illustration, philosophical mood",
        "dark contemplation, sharp thoughts, scary philosophy, complex thinking",
    ),
    (
        "page_11_understanding",
        "Happy soap bubble with bright smile, artistic brush strokes surrounding bubble showing creativity, bright colors and open composition, enlightenment feeling, soft watercolor style, children's illustration, joyful realization, creative atmosphere",
        "dark enlightenment, sharp realization, scary creativity, complex art",
    ),
    (
        "page_12_continuing",
        "Soap bubble flying toward edge of page, infinite gradient sky background extending to infinity, warm colors and complete composition, continuous flying motion, soft watercolor style, children's illustration, eternal journey theme",
        "dark journey, sharp flying, scary infinity, complex travel",
    ),
];
