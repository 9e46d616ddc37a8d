//! Syndication feed rendering
//!
//! Deterministically renders the episode catalog into the RSS document
//! published at the well-known feed key. Channel metadata is fixed; one item
//! is emitted per episode, in input order.

use std::path::Path;

use rss::extension::itunes::{
    ITunesCategoryBuilder, ITunesChannelExtensionBuilder, ITunesOwnerBuilder,
};
use rss::{CategoryBuilder, ChannelBuilder, EnclosureBuilder, GuidBuilder, ImageBuilder, ItemBuilder};

use crate::services::episode_catalog::EpisodeFile;

const CHANNEL_TITLE: &str = "ATP Live Broadcast";
const CHANNEL_LINK: &str = "https://atp.fm";
const CHANNEL_DESCRIPTION: &str =
    "Three nerds discussing tech, Apple, programming, and loosely related matters.";
const CHANNEL_AUTHOR: &str = "Marco Arment, Casey Liss, John Siracusa";
const CHANNEL_OWNER: &str = "atp@marco.org";
const CHANNEL_CATEGORY: &str = "Technology";
const CHANNEL_IMAGE_URL: &str = "http://static1.squarespace.com/static/513abd71e4b0fe58c655c105/t/52c45a37e4b0a77a5034aa84/1388599866232/1500w/Artwork.jpg";
const MP3_MIME: &str = "audio/mpeg";

/// Renders the episode catalog into a feed document
pub struct FeedGenerator {
    base_url: String,
}

impl FeedGenerator {
    /// `base_url` is the public root under which episode objects are served
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Render the feed document; pure, infallible, order-preserving
    pub fn render(&self, episodes: &[EpisodeFile]) -> String {
        let items: Vec<rss::Item> = episodes.iter().map(|e| self.render_item(e)).collect();

        let itunes = ITunesChannelExtensionBuilder::default()
            .author(Some(CHANNEL_AUTHOR.to_string()))
            .subtitle(Some(CHANNEL_DESCRIPTION.to_string()))
            .summary(Some(CHANNEL_DESCRIPTION.to_string()))
            .explicit(Some("no".to_string()))
            .block(Some("yes".to_string()))
            .image(Some(CHANNEL_IMAGE_URL.to_string()))
            .owner(Some(
                ITunesOwnerBuilder::default()
                    .name(Some(CHANNEL_OWNER.to_string()))
                    .email(Some(CHANNEL_OWNER.to_string()))
                    .build(),
            ))
            .categories(vec![ITunesCategoryBuilder::default()
                .text(CHANNEL_CATEGORY)
                .build()])
            .build();

        let channel = ChannelBuilder::default()
            .title(CHANNEL_TITLE)
            .link(CHANNEL_LINK)
            .description(CHANNEL_DESCRIPTION)
            .image(Some(
                ImageBuilder::default()
                    .url(CHANNEL_IMAGE_URL)
                    .title(CHANNEL_TITLE)
                    .link(CHANNEL_LINK)
                    .build(),
            ))
            .categories(vec![CategoryBuilder::default().name(CHANNEL_CATEGORY).build()])
            .itunes_ext(itunes)
            .items(items)
            .build();

        channel.to_string()
    }

    fn render_item(&self, episode: &EpisodeFile) -> rss::Item {
        let title = episode_title(&episode.path);
        let enclosure_url = format!("{}/{}", self.base_url, episode.path);

        let enclosure = EnclosureBuilder::default()
            .url(enclosure_url.clone())
            .length(episode.size.to_string())
            .mime_type(MP3_MIME)
            .build();

        ItemBuilder::default()
            .title(title.to_string())
            .description(title.to_string())
            .pub_date(episode.last_modified.to_rfc2822())
            .guid(GuidBuilder::default().value(enclosure_url).permalink(true).build())
            .enclosure(enclosure)
            .build()
    }
}

/// Base filename with the `.mp3` suffix stripped; malformed paths degrade to
/// the best-effort stripped form rather than aborting
fn episode_title(path: &str) -> &str {
    let file_name = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path);
    file_name.strip_suffix(".mp3").unwrap_or(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn episode(path: &str, size: u64) -> EpisodeFile {
        EpisodeFile {
            path: path.to_string(),
            size,
            last_modified: Utc.with_ymd_and_hms(2018, 11, 15, 4, 8, 43).unwrap(),
        }
    }

    #[test]
    fn strips_suffix_for_titles() {
        assert_eq!(episode_title("processed/Episode 300.mp3"), "Episode 300");
        assert_eq!(episode_title("Episode 300.mp3"), "Episode 300");
        assert_eq!(episode_title("processed/odd name.wav"), "odd name.wav");
        assert_eq!(episode_title("processed/"), "processed/");
    }

    #[test]
    fn renders_one_item_per_episode_in_input_order() {
        let generator = FeedGenerator::new("https://episodes.example.com");
        let feed = generator.render(&[
            episode("processed/Zed.mp3", 10),
            episode("processed/Alpha.mp3", 20),
        ]);

        assert_eq!(feed.matches("<enclosure").count(), 2);
        let zed = feed.find("Zed").unwrap();
        let alpha = feed.find("Alpha").unwrap();
        assert!(zed < alpha, "input order must be preserved");
    }

    #[test]
    fn item_carries_enclosure_url_size_and_pub_date() {
        let generator = FeedGenerator::new("https://episodes.example.com/");
        let feed = generator.render(&[episode("processed/Episode 300.mp3", 1234)]);

        assert!(feed.contains("<title>Episode 300</title>"));
        assert!(feed.contains("https://episodes.example.com/processed/Episode 300.mp3"));
        assert!(feed.contains("length=\"1234\""));
        assert!(feed.contains("audio/mpeg"));
        assert!(feed.contains("15 Nov 2018 04:08:43"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let generator = FeedGenerator::new("https://episodes.example.com");
        let episodes = vec![
            episode("processed/A.mp3", 1),
            episode("processed/B.mp3", 2),
            episode("processed/C.mp3", 3),
        ];
        assert_eq!(generator.render(&episodes), generator.render(&episodes));
    }

    #[test]
    fn empty_catalog_renders_a_valid_document_with_no_items() {
        let generator = FeedGenerator::new("https://episodes.example.com");
        let feed = generator.render(&[]);

        assert!(feed.contains("<rss"));
        assert!(feed.contains("<title>ATP Live Broadcast</title>"));
        assert!(!feed.contains("<item>"));
    }
}
