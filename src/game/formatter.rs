//! Message formatting for display.
//!
//! Handles `{placeholder}` substitution in message templates plus the
//! small text rewrites applied on either side of the relay. Everything
//! here is pure.

use std::collections::HashMap;

use emojis::SkinTone;

/// Marker users type for colors in the game-bound chat format.
pub const COLOR_MARKER: char = '&';

/// The game client's own formatting-code marker.
pub const GAME_COLOR_MARKER: char = '§';

/// Values for the placeholders of one render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    values: HashMap<String, String>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` (without braces) to `value`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Substitute every bound `{name}` in `template`.
///
/// Single left-to-right pass: substituted values are never scanned again,
/// and placeholders without a binding are copied through untouched.
pub fn render(template: &str, bindings: &Bindings) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after.find(|c: char| c == '{' || c == '}') {
            Some(close) if after[close..].starts_with('}') => {
                let name = &after[..close];
                match bindings.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            // Unterminated, or another '{' starts first.
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Rewrite every [`COLOR_MARKER`] to [`GAME_COLOR_MARKER`].
pub fn remap_color_codes(text: &str) -> String {
    text.replace(COLOR_MARKER, &GAME_COLOR_MARKER.to_string())
}

/// Defuse `@everyone` and `@here` so a player cannot ping the whole server.
pub fn mask_mass_mentions(text: &str) -> String {
    text.replace("@everyone", "(at)everyone")
        .replace("@here", "(at)here")
}

/// Derive the `{reason}` of a death from the server's raw death text.
///
/// Strips the player's own name and the following space once, from the
/// start only. Texts that do not begin with the name pass through as-is.
pub fn death_reason<'a>(death_message: &'a str, player: &str) -> &'a str {
    if player.is_empty() {
        return death_message;
    }
    death_message
        .strip_prefix(player)
        .and_then(|rest| rest.strip_prefix(' '))
        .unwrap_or(death_message)
}

/// Longest emoji sequence (in chars) tried at one position.
const MAX_EMOJI_CHARS: usize = 10;

/// Convert unicode emoji to text aliases (e.g., 😀 -> :grinning:).
///
/// Skin-tone variants map to their base emoji. Uses the shortcode if there
/// is one, otherwise the emoji's name with spaces as underscores. Tries the
/// longest sequence first so ZWJ and skin-tone sequences map as one emoji.
pub fn shortcode_emojis(text: &str) -> String {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let (start, ch) = chars[i];
        if ch.is_ascii() {
            out.push(ch);
            i += 1;
            continue;
        }

        let longest = (i + MAX_EMOJI_CHARS).min(chars.len());
        let found = (i + 1..=longest).rev().find_map(|end| {
            let stop = chars.get(end).map_or(text.len(), |&(idx, _)| idx);
            emojis::get(&text[start..stop]).map(|emoji| (end, emoji))
        });

        match found {
            Some((end, emoji)) => {
                let base = match emoji.skin_tone() {
                    Some(_) => emoji.with_skin_tone(SkinTone::Default).unwrap_or(emoji),
                    None => emoji,
                };
                out.push(':');
                match base.shortcode() {
                    Some(shortcode) => out.push_str(shortcode),
                    None => out.push_str(&base.name().replace(' ', "_")),
                }
                out.push(':');
                i = end;
            }
            None => {
                out.push(ch);
                i += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_render() {
        let bindings = Bindings::new()
            .with("username", "Steve")
            .with("reason", "fell from a high place");

        assert_eq!(
            render("```{username} {reason}```", &bindings),
            "```Steve fell from a high place```"
        );
    }

    #[test]
    fn test_unknown_placeholder_untouched() {
        let bindings = Bindings::new().with("a", "x");
        assert_eq!(render("{a}-{b}", &bindings), "x-{b}");
    }

    #[test]
    fn test_empty_bindings_is_identity() {
        let template = "&b[Discord] <{userTag}> {userMessage} {";
        assert_eq!(render(template, &Bindings::new()), template);
    }

    #[test]
    fn test_every_occurrence_replaced() {
        let bindings = Bindings::new().with("username", "Amy");
        assert_eq!(render("{username}/{username}", &bindings), "Amy/Amy");
    }

    #[test]
    fn test_substitution_is_not_recursive() {
        let bindings = Bindings::new()
            .with("userMessage", "{userTag}")
            .with("userTag", "bob");
        assert_eq!(render("<{userTag}> {userMessage}", &bindings), "<bob> {userTag}");
    }

    #[test]
    fn test_stray_braces() {
        let bindings = Bindings::new().with("b", "B");
        assert_eq!(render("{a{b}}", &bindings), "{aB}");
        assert_eq!(render("}{", &bindings), "}{");
        assert_eq!(render("{}", &bindings), "{}");
    }

    #[test]
    fn test_remap_color_codes_total() {
        let rendered = remap_color_codes("&b&l[Discord] &r<a&b> &&");
        assert!(!rendered.contains('&'));
        assert_eq!(rendered, "§b§l[Discord] §r<a§b> §§");
    }

    #[test]
    fn test_mask_mass_mentions() {
        assert_eq!(mask_mass_mentions("hi @everyone"), "hi (at)everyone");
        assert_eq!(mask_mass_mentions("@here and @here"), "(at)here and (at)here");
        assert_eq!(mask_mass_mentions("@someone"), "@someone");
    }

    #[test]
    fn test_death_reason_prefix_strip() {
        assert_eq!(
            death_reason("Steve fell from a high place", "Steve"),
            "fell from a high place"
        );
    }

    #[test]
    fn test_death_reason_strips_once() {
        assert_eq!(
            death_reason("Steve was slain by Steve Jr", "Steve"),
            "was slain by Steve Jr"
        );
    }

    #[test]
    fn test_death_reason_without_prefix() {
        assert_eq!(
            death_reason("Zombie killed Steve", "Steve"),
            "Zombie killed Steve"
        );
        // Name must be followed by a space to count as the prefix.
        assert_eq!(death_reason("Steven drowned", "Steve"), "Steven drowned");
        assert_eq!(death_reason("Steve drowned", ""), "Steve drowned");
    }

    #[test]
    fn test_shortcode_emojis() {
        assert_eq!(shortcode_emojis("gg 😀"), "gg :grinning:");
        assert_eq!(shortcode_emojis("plain text"), "plain text");
        assert_eq!(shortcode_emojis("café"), "café");
    }

    #[test]
    fn test_skin_tone_maps_to_base_shortcode() {
        assert_eq!(shortcode_emojis("hi 👋🏽"), "hi :wave:");
        assert_eq!(shortcode_emojis("👋🏽👋"), ":wave::wave:");
    }
}
