//! `audio` and `video` renderers for self-hosted media.
//!
//! Sources on streaming or social platforms are rejected; those need the
//! `embed` renderer instead.

use super::{base_defaults, positive_id};
use crate::application::dispatch::Renderer;
use crate::application::output::wrap_output;
use crate::application::resolver::handlers::loaded;
use crate::application::scope::RenderScope;
use crate::domain::attributes::AttributeMap;
use crate::util::html::{clean_url, escape_html, url_host};
use crate::util::text::is_truthy;

const BLOCKED_VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "youtu.be",
    "vimeo.com",
    "www.vimeo.com",
    "dailymotion.com",
    "www.dailymotion.com",
];

const BLOCKED_AUDIO_HOSTS: &[&str] = &[
    "soundcloud.com",
    "www.soundcloud.com",
    "spotify.com",
    "www.spotify.com",
    "open.spotify.com",
    "music.apple.com",
    "deezer.com",
    "www.deezer.com",
    "tidal.com",
    "www.tidal.com",
    "pandora.com",
    "www.pandora.com",
    "mixcloud.com",
    "www.mixcloud.com",
    "audiomack.com",
    "www.audiomack.com",
];

const PRELOAD_VALUES: &[&str] = &["auto", "metadata", "none"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    fn tag(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    fn blocked_hosts(self) -> &'static [&'static str] {
        match self {
            MediaKind::Audio => BLOCKED_AUDIO_HOSTS,
            MediaKind::Video => BLOCKED_VIDEO_HOSTS,
        }
    }

    fn boolean_attributes(self) -> &'static [&'static str] {
        match self {
            MediaKind::Audio => &["controls", "autoplay", "loop", "muted"],
            MediaKind::Video => &["controls", "autoplay", "loop", "muted", "playsinline"],
        }
    }

    fn blocked_message(self) -> &'static str {
        match self {
            MediaKind::Audio => "Streaming audio URLs are not supported by the audio shortcode.",
            MediaKind::Video => "Social video URLs are not supported by the video shortcode.",
        }
    }

    fn unsupported_message(self) -> &'static str {
        match self {
            MediaKind::Audio => "Your browser does not support HTML5 audio.",
            MediaKind::Video => "Your browser does not support HTML5 video.",
        }
    }
}

/// Exact host match or any subdomain of a listed host.
pub fn is_blocked_host(url: &str, blocked: &[&str]) -> bool {
    let Some(host) = url_host(url) else {
        return false;
    };
    blocked.iter().any(|domain| {
        host == *domain
            || host
                .strip_suffix(domain)
                .is_some_and(|rest| rest.ends_with('.'))
    })
}

pub struct MediaRenderer {
    kind: MediaKind,
}

impl MediaRenderer {
    pub fn new(kind: MediaKind) -> Self {
        Self { kind }
    }

    fn source(&self, attributes: &AttributeMap, scope: &RenderScope<'_>) -> String {
        let attachment = positive_id(attributes, "attachment_id").and_then(|id| {
            loaded(
                scope.engine().collaborators().content.attachment_url(id),
                "attachment_url",
            )
        });
        match attachment {
            Some(url) if !url.is_empty() => url,
            _ => attributes.trimmed("src"),
        }
    }
}

impl Renderer for MediaRenderer {
    fn type_tag(&self) -> &str {
        self.kind.tag()
    }

    fn defaults(&self, _scope: &RenderScope<'_>) -> AttributeMap {
        let mut defaults = base_defaults();
        for key in ["src", "attachment_id", "width", "height", "class", "id"] {
            defaults.insert(key, "");
        }
        defaults.insert("autoplay", "false");
        defaults.insert("loop", "false");
        defaults.insert("muted", "false");
        defaults.insert("controls", "true");
        defaults.insert("preload", "metadata");
        if self.kind == MediaKind::Video {
            defaults.insert("poster", "");
            defaults.insert("playsinline", "true");
        }
        defaults
    }

    fn render(&self, attributes: &AttributeMap, _content: &str, scope: &RenderScope<'_>) -> String {
        let src = self.source(attributes, scope);
        if src.is_empty() {
            return String::new();
        }

        if is_blocked_host(&src, self.kind.blocked_hosts()) {
            if !scope.context().is_privileged() {
                return String::new();
            }
            return format!(
                "<span class=\"weft-{}-error\">{}</span>",
                self.kind.tag(),
                escape_html(self.kind.blocked_message())
            );
        }

        let mut parts: Vec<String> = Vec::new();

        let id = attributes.trimmed("id");
        if !id.is_empty() {
            parts.push(format!("id=\"{}\"", escape_html(&id)));
        }

        let mut classes = vec![format!("weft-{}", self.kind.tag())];
        let extra = attributes.trimmed("class");
        if !extra.is_empty() {
            classes.push(extra);
        }
        parts.push(format!("class=\"{}\"", escape_html(&classes.join(" "))));
        parts.push(format!("src=\"{}\"", clean_url(&src)));

        if self.kind == MediaKind::Video {
            let poster = attributes.trimmed("poster");
            if !poster.is_empty() {
                parts.push(format!("poster=\"{}\"", clean_url(&poster)));
            }
            for dimension in ["width", "height"] {
                if let Ok(pixels) = attributes.trimmed(dimension).parse::<i64>() {
                    parts.push(format!("{dimension}=\"{pixels}\""));
                }
            }
        }

        for flag in self.kind.boolean_attributes() {
            if is_truthy(&attributes.text(flag)) {
                parts.push((*flag).to_string());
            }
        }

        let preload = attributes.trimmed("preload").to_ascii_lowercase();
        if PRELOAD_VALUES.contains(&preload.as_str()) {
            parts.push(format!("preload=\"{preload}\""));
        }

        let element = format!(
            "<{tag} {attrs}>{message}</{tag}>",
            tag = self.kind.tag(),
            attrs = parts.join(" "),
            message = escape_html(self.kind.unsupported_message()),
        );

        scope
            .engine()
            .sanitizer()
            .clean(&wrap_output(&element, attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_exact_hosts_and_subdomains() {
        assert!(is_blocked_host("https://youtube.com/watch?v=1", BLOCKED_VIDEO_HOSTS));
        assert!(is_blocked_host("https://m.youtube.com/watch?v=1", BLOCKED_VIDEO_HOSTS));
        assert!(is_blocked_host("https://player.vimeo.com/video/1", BLOCKED_VIDEO_HOSTS));
        assert!(!is_blocked_host("https://notyoutube.com/a.mp4", BLOCKED_VIDEO_HOSTS));
        assert!(!is_blocked_host("/uploads/a.mp4", BLOCKED_VIDEO_HOSTS));
    }

    #[test]
    fn audio_platforms_are_separate() {
        assert!(is_blocked_host("https://open.spotify.com/track/1", BLOCKED_AUDIO_HOSTS));
        assert!(!is_blocked_host("https://open.spotify.com/track/1", BLOCKED_VIDEO_HOSTS));
    }
}
