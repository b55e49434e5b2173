//! Page records
//!
//! The literal content of each book page: which illustration it shows and
//! which lines of story text go under it.

use bubblebook_core::{BookError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a line of story text is styled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextKind {
    /// Sound effect ("噗噗噗...")
    Sound,
    /// Narration
    Normal,
    /// Spoken line, drawn in a bordered box
    Speech,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextItem {
    pub kind: TextKind,
    pub content: String,
}

impl TextItem {
    pub fn new(kind: TextKind, content: &str) -> Self {
        Self {
            kind,
            content: content.to_string(),
        }
    }

    /// Text as printed; speech is wrapped in corner brackets
    pub fn display_text(&self) -> String {
        match self.kind {
            TextKind::Speech => format!("「{}」", self.content),
            _ => self.content.clone(),
        }
    }
}

/// Which page template a record uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PageKind {
    Cover {
        title: String,
        subtitle: String,
        author: String,
        year: String,
    },
    Content,
}

/// One book page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    #[serde(flatten)]
    pub kind: PageKind,
    /// Image file name, relative to the images directory
    pub image: String,
    #[serde(default)]
    pub texts: Vec<TextItem>,
}

impl PageRecord {
    pub fn cover(image: &str, title: &str, subtitle: &str, author: &str, year: &str) -> Self {
        Self {
            kind: PageKind::Cover {
                title: title.to_string(),
                subtitle: subtitle.to_string(),
                author: author.to_string(),
                year: year.to_string(),
            },
            image: image.to_string(),
            texts: Vec::new(),
        }
    }

    pub fn content(image: &str, texts: &[(TextKind, &str)]) -> Self {
        Self {
            kind: PageKind::Content,
            image: image.to_string(),
            texts: texts
                .iter()
                .map(|(kind, content)| TextItem::new(*kind, content))
                .collect(),
        }
    }

    pub fn image_path(&self, images_dir: &Path) -> PathBuf {
        images_dir.join(&self.image)
    }

    pub fn is_cover(&self) -> bool {
        matches!(self.kind, PageKind::Cover { .. })
    }
}

/// Top-level structure of a `book.toml` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookFile {
    #[serde(default)]
    pub title: Option<String>,
    pub pages: Vec<PageRecord>,
}

impl BookFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let book: BookFile = toml::from_str(&content).map_err(|e| {
            BookError::ConfigError(format!("Failed to parse book {}: {}", path.display(), e))
        })?;
        if book.pages.is_empty() {
            return Err(BookError::ValidationError(format!(
                "{} defines no pages",
                path.display()
            )));
        }
        Ok(book)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The bundled story
    pub fn builtin() -> Self {
        Self {
            title: Some(BUILTIN_TITLE.to_string()),
            pages: builtin_story(),
        }
    }

    /// Document title: explicit title, else the cover title
    pub fn document_title(&self) -> String {
        if let Some(ref title) = self.title {
            return title.clone();
        }
        self.pages
            .iter()
            .find_map(|page| match page.kind {
                PageKind::Cover { ref title, .. } => Some(title.clone()),
                PageKind::Content => None,
            })
            .unwrap_or_else(|| "Picture Book".to_string())
    }
}

pub const BUILTIN_TITLE: &str = "泡泡知道自己在哪裡";
pub const DEFAULT_OUTPUT: &str = "泡泡知道自己在哪裡.pdf";

/// Cover plus nine content pages of "The bubble knows where it is"
pub fn builtin_story() -> Vec<PageRecord> {
    use TextKind::{Normal, Sound, Speech};

    vec![
        PageRecord::cover(
            "Cover.png",
            BUILTIN_TITLE,
            "寶寶的範疇思維書",
            "作者：郭庭愷",
            "2025年",
        ),
        PageRecord::content(
            "Page1.png",
            &[
                (Sound, "噗噗噗..."),
                (Normal, "泡泡從泡泡機裡飛出來"),
                (Normal, "圓圓的、透明的"),
                (Speech, "泡泡知道自己是泡泡"),
            ],
        ),
        PageRecord::content(
            "Page2.png",
            &[
                (Normal, "泡泡在鏡子前"),
                (Normal, "看到另一個泡泡"),
                (Speech, "那是誰？"),
                (Speech, "是我！"),
            ],
        ),
        PageRecord::content(
            "Page3.png",
            &[
                (Normal, "泡泡裡有彩虹"),
                (Normal, "泡泡外有風"),
                (Normal, "泡泡知道："),
                (Speech, "我在裡面，世界在外面"),
            ],
        ),
        PageRecord::content(
            "Page4.png",
            &[
                (Sound, "呼呼呼..."),
                (Normal, "泡泡越來越大"),
                (Normal, "邊界越來越薄"),
                (Normal, "快要...快要..."),
            ],
        ),
        PageRecord::content(
            "Page5.png",
            &[
                (Sound, "啪！"),
                (Normal, "泡泡不見了"),
                (Normal, "彩虹飛散了"),
                (Normal, "風吹進來了"),
            ],
        ),
        PageRecord::content(
            "Page6.png",
            &[
                (Sound, "噗噗噗..."),
                (Normal, "又一個泡泡飛出來"),
                (Normal, "圓圓的、透明的"),
                (Speech, "我又是泡泡了！"),
            ],
        ),
        PageRecord::content(
            "Page7.png",
            &[
                (Normal, "好多泡泡！"),
                (Normal, "每個泡泡都有自己的彩虹"),
                (Normal, "每個泡泡都有自己的邊界"),
                (Normal, "每個泡泡都知道自己在哪裡"),
            ],
        ),
        PageRecord::content(
            "Page8.png",
            &[
                (Normal, "兩個泡泡輕輕碰在一起"),
                (Normal, "邊界變模糊了"),
                (Speech, "我們是一起的嗎？"),
                (Speech, "我們還是分開的嗎？"),
            ],
        ),
        PageRecord::content(
            "Page9.png",
            &[
                (Normal, "變成一個大泡泡！"),
                (Normal, "彩虹混合了"),
                (Normal, "邊界重新畫了"),
                (Speech, "我們現在是一體的"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_story_shape() {
        let pages = builtin_story();
        assert_eq!(pages.len(), 10);
        assert!(pages[0].is_cover());
        assert!(pages[1..].iter().all(|p| p.kind == PageKind::Content));
        assert_eq!(pages[9].image, "Page9.png");
        assert!(pages[1..].iter().all(|p| p.texts.len() == 4));
    }

    #[test]
    fn test_speech_is_bracketed() {
        let item = TextItem::new(TextKind::Speech, "是我！");
        assert_eq!(item.display_text(), "「是我！」");
        let item = TextItem::new(TextKind::Sound, "啪！");
        assert_eq!(item.display_text(), "啪！");
    }

    #[test]
    fn test_book_file_parse() {
        let toml_str = r#"
[[pages]]
kind = "cover"
image = "Cover.png"
title = "The Bubble"
subtitle = "A first book"
author = "by Someone"
year = "2025"

[[pages]]
kind = "content"
image = "Page1.png"
texts = [
    { kind = "sound", content = "Pop!" },
    { kind = "speech", content = "Who is that?" },
]
"#;
        let book: BookFile = toml::from_str(toml_str).unwrap();
        assert_eq!(book.pages.len(), 2);
        assert_eq!(book.document_title(), "The Bubble");
        assert_eq!(book.pages[1].texts[0].kind, TextKind::Sound);
        assert_eq!(book.pages[1].texts[1].display_text(), "「Who is that?」");
    }

    #[test]
    fn test_book_file_save_and_load() {
        let dir = std::env::temp_dir().join(format!("bubblebook_pages_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("book.toml");

        BookFile::builtin().save(&path).unwrap();
        let loaded = BookFile::load(&path).unwrap();
        assert_eq!(loaded.pages, builtin_story());
        assert_eq!(loaded.document_title(), BUILTIN_TITLE);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_book_is_rejected() {
        let dir = std::env::temp_dir().join(format!("bubblebook_pages_empty_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("book.toml");
        std::fs::write(&path, "pages = []\n").unwrap();

        assert!(matches!(BookFile::load(&path), Err(BookError::ValidationError(_))));
        std::fs::remove_dir_all(&dir).ok();
    }
}
