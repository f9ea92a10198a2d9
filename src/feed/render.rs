// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use rss::extension::itunes::{
    ITunesCategory, ITunesChannelExtension, ITunesItemExtension, ITunesOwner,
};
use rss::{Channel, Enclosure, Guid, Image, Item};
use url::Url;

use super::channel::ChannelDescriptor;
use crate::episode::EpisodeRecord;
use crate::error::FeedError;
use crate::publish::{audio_key, public_url};

const AUDIO_MIME_TYPE: &str = "audio/mpeg";
const GENERATOR: &str = concat!("podpub ", env!("CARGO_PKG_VERSION"));

/// Public locations the rendered feed points at
#[derive(Debug, Clone)]
pub struct FeedLinks {
    /// Base URL the store is served from (usually the CDN domain)
    pub media_base: Url,
    /// Public URL of the channel artwork, if it was published
    pub artwork_url: Option<String>,
}

impl FeedLinks {
    /// Public URL of an episode's audio file, also used as its GUID
    pub fn media_url(&self, filename: &str) -> String {
        public_url(&self.media_base, &audio_key(filename))
    }
}

/// Format a millisecond duration as `HH:MM:SS`
///
/// Hours are not wrapped, so episodes longer than 99 hours get more digits.
pub fn format_duration(duration_ms: u64) -> String {
    let total_seconds = duration_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Render the RSS 2.0 / iTunes feed document
///
/// Episodes are written in the order given. The output only depends on the
/// arguments (no timestamps of the rendering itself), so the same episode
/// list always produces the same bytes and an unchanged feed is never
/// re-uploaded.
pub fn render_feed(
    channel: &ChannelDescriptor,
    episodes: &[EpisodeRecord],
    links: &FeedLinks,
) -> Result<String, FeedError> {
    let website = channel.validate()?;

    let mut rss_channel = Channel::default();
    rss_channel.set_title(channel.title.clone());
    rss_channel.set_link(website.to_string());
    rss_channel.set_description(channel.description.clone());
    rss_channel.set_language(Some(channel.language.clone()));
    rss_channel.set_copyright(channel.copyright.clone());
    rss_channel.set_managing_editor(channel.managing_editor());
    rss_channel.set_generator(Some(GENERATOR.to_string()));
    rss_channel.set_pub_date(
        episodes
            .iter()
            .map(|episode| episode.publish_date)
            .max()
            .map(|date| date.to_rfc2822()),
    );

    if let Some(artwork_url) = &links.artwork_url {
        let mut image = Image::default();
        image.set_url(artwork_url.clone());
        image.set_title(channel.title.clone());
        image.set_link(website.to_string());
        rss_channel.set_image(Some(image));
    }

    rss_channel.set_itunes_ext(Some(channel_itunes_ext(channel, links)));
    rss_channel.set_items(
        episodes
            .iter()
            .map(|episode| render_item(episode, links))
            .collect::<Vec<_>>(),
    );

    let bytes = rss_channel.pretty_write_to(Vec::new(), b' ', 2)?;
    Ok(String::from_utf8(bytes)?)
}

fn channel_itunes_ext(channel: &ChannelDescriptor, links: &FeedLinks) -> ITunesChannelExtension {
    let mut ext = ITunesChannelExtension::default();
    ext.set_author(Some(channel.author.clone()));
    ext.set_summary(Some(channel.description.clone()));
    ext.set_image(links.artwork_url.clone());
    ext.set_explicit(Some(
        if channel.explicit { "true" } else { "false" }.to_string(),
    ));

    let mut owner = ITunesOwner::default();
    owner.set_name(Some(channel.author.clone()));
    owner.set_email(channel.email.clone());
    ext.set_owner(Some(owner));

    if let Some(category) = &channel.category {
        let mut itunes_category = ITunesCategory::default();
        itunes_category.set_text(category.clone());
        ext.set_categories(vec![itunes_category]);
    }

    ext
}

fn render_item(episode: &EpisodeRecord, links: &FeedLinks) -> Item {
    let media_url = links.media_url(&episode.filename);

    let mut guid = Guid::default();
    guid.set_value(media_url.clone());
    guid.set_permalink(true);

    let mut enclosure = Enclosure::default();
    enclosure.set_url(media_url);
    enclosure.set_length(episode.size_bytes.to_string());
    enclosure.set_mime_type(AUDIO_MIME_TYPE);

    let mut itunes = ITunesItemExtension::default();
    itunes.set_duration(Some(format_duration(episode.duration_ms)));

    let mut item = Item::default();
    item.set_title(Some(episode.title.clone()));
    item.set_description(Some(episode.description.clone()));
    item.set_pub_date(Some(episode.publish_date.to_rfc2822()));
    item.set_guid(Some(guid));
    item.set_enclosure(Some(enclosure));
    item.set_itunes_ext(Some(itunes));
    item
}
