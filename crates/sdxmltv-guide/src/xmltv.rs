//! XMLTV document rendering.

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use quick_xml::Writer;
use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::assemble::{Channel, Listing};

/// XML declaration and DOCTYPE written ahead of the root element.
const PROLOG: &[u8] =
    b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n";

/// `source-info-url` attribute of `<tv>`.
const SOURCE_INFO_URL: &str = "https://schedulesdirect.org";

/// `source-info-name` attribute of `<tv>`.
const SOURCE_INFO_NAME: &str = "Schedules Direct";

/// `generator-info-name` attribute of `<tv>`.
const GENERATOR_INFO_NAME: &str = concat!("sdxmltv/", env!("CARGO_PKG_VERSION"));

/// Language tag of title, sub-title and description.
const LANG: &str = "en";

/// XMLTV timestamp layout (`YYYYMMDDHHMMSS ±HHMM`).
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// The document writer failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to render XMLTV document: {0}")]
pub struct DocumentError(String);

/// Formats `instant` in `offset` as an XMLTV timestamp.
#[must_use]
pub fn format_timestamp(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant
        .with_timezone(&offset)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Renders channels and listings, using the local UTC offset captured now.
///
/// # Errors
///
/// Returns [`DocumentError`] if the XML writer fails.
pub fn build_document(channels: &[Channel], listings: &[Listing]) -> Result<Vec<u8>, DocumentError> {
    let offset = Local::now().offset().fix();
    build_document_with_offset(channels, listings, offset)
}

/// Renders channels and listings with every timestamp in `offset`.
///
/// Channels come first, then listings, each in input order. Text and
/// attribute values escape `& < > " '`.
///
/// # Errors
///
/// Returns [`DocumentError`] if the XML writer fails.
pub fn build_document_with_offset(
    channels: &[Channel],
    listings: &[Listing],
    offset: FixedOffset,
) -> Result<Vec<u8>, DocumentError> {
    let mut writer = Writer::new_with_indent(PROLOG.to_vec(), b' ', 2);

    let mut tv = BytesStart::new("tv");
    tv.push_attribute(("source-info-url", SOURCE_INFO_URL));
    tv.push_attribute(("source-info-name", SOURCE_INFO_NAME));
    tv.push_attribute(("generator-info-name", GENERATOR_INFO_NAME));
    write(&mut writer, Event::Start(tv))?;

    for channel in channels {
        write_channel(&mut writer, channel)?;
    }
    for listing in listings {
        write_listing(&mut writer, listing, offset)?;
    }

    write(&mut writer, Event::End(BytesEnd::new("tv")))?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    Ok(out)
}

fn write_channel(writer: &mut Writer<Vec<u8>>, channel: &Channel) -> Result<(), DocumentError> {
    let mut start = BytesStart::new("channel");
    start.push_attribute(("id", channel.id.as_str()));
    write(writer, Event::Start(start))?;

    write_text_element(writer, "display-name", None, &channel.name)?;
    if let Some(icon) = channel.icon.as_deref() {
        write_icon(writer, icon)?;
    }

    write(writer, Event::End(BytesEnd::new("channel")))
}

fn write_listing(
    writer: &mut Writer<Vec<u8>>,
    listing: &Listing,
    offset: FixedOffset,
) -> Result<(), DocumentError> {
    let mut start = BytesStart::new("programme");
    start.push_attribute(("start", format_timestamp(listing.start, offset).as_str()));
    start.push_attribute(("stop", format_timestamp(listing.stop, offset).as_str()));
    start.push_attribute(("channel", listing.channel.as_str()));
    write(writer, Event::Start(start))?;

    write_text_element(writer, "title", Some(LANG), &listing.title)?;
    if !listing.sub_title.is_empty() {
        write_text_element(writer, "sub-title", Some(LANG), &listing.sub_title)?;
    }
    if !listing.description.is_empty() {
        write_text_element(writer, "desc", Some(LANG), &listing.description)?;
    }
    if let Some(icon) = listing.icon.as_deref() {
        write_icon(writer, icon)?;
    }
    if !listing.program_id.is_empty() {
        let mut episode = BytesStart::new("episode-num");
        episode.push_attribute(("system", "dd_progid"));
        write(writer, Event::Start(episode))?;
        write(
            writer,
            Event::Text(BytesText::from_escaped(escape(listing.program_id.as_str()))),
        )?;
        write(writer, Event::End(BytesEnd::new("episode-num")))?;
    }

    write(writer, Event::End(BytesEnd::new("programme")))
}

fn write_text_element(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    lang: Option<&str>,
    text: &str,
) -> Result<(), DocumentError> {
    let mut start = BytesStart::new(name);
    if let Some(lang) = lang {
        start.push_attribute(("lang", lang));
    }
    write(writer, Event::Start(start))?;
    // `BytesText::new` leaves quotes alone; escape all five.
    write(writer, Event::Text(BytesText::from_escaped(escape(text))))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write_icon(writer: &mut Writer<Vec<u8>>, src: &str) -> Result<(), DocumentError> {
    let mut icon = BytesStart::new("icon");
    icon.push_attribute(("src", src));
    write(writer, Event::Empty(icon))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DocumentError> {
    writer
        .write_event(event)
        .map_err(|e| DocumentError(e.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use chrono::TimeZone;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Tv {
        #[serde(rename = "@generator-info-name")]
        generator: String,
        #[serde(rename = "channel", default)]
        channels: Vec<TvChannel>,
        #[serde(rename = "programme", default)]
        programmes: Vec<TvProgramme>,
    }

    #[derive(Debug, Deserialize)]
    struct TvChannel {
        #[serde(rename = "@id")]
        id: String,
        #[serde(rename = "display-name")]
        display_name: String,
        icon: Option<TvIcon>,
    }

    #[derive(Debug, Deserialize)]
    struct TvProgramme {
        #[serde(rename = "@start")]
        start: String,
        #[serde(rename = "@stop")]
        stop: String,
        #[serde(rename = "@channel")]
        channel: String,
        title: TvText,
        #[serde(rename = "sub-title")]
        sub_title: Option<TvText>,
        desc: Option<TvText>,
        icon: Option<TvIcon>,
        #[serde(rename = "episode-num")]
        episode_num: Option<TvText>,
    }

    #[derive(Debug, Deserialize)]
    struct TvText {
        #[serde(rename = "$text")]
        text: String,
    }

    #[derive(Debug, Deserialize)]
    struct TvIcon {
        #[serde(rename = "@src")]
        src: String,
    }

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 28, h, m, 0).unwrap()
    }

    fn central() -> FixedOffset {
        FixedOffset::west_opt(6 * 3600).unwrap()
    }

    fn listing(title: &str, description: &str) -> Listing {
        Listing {
            channel: String::from("98078"),
            start: utc(20, 0),
            stop: utc(21, 0),
            title: String::from(title),
            sub_title: String::new(),
            description: String::from(description),
            icon: None,
            program_id: String::new(),
        }
    }

    fn kets() -> Channel {
        Channel {
            id: String::from("98078"),
            name: String::from("2.1 KETS-1"),
            icon: None,
        }
    }

    fn render(channels: &[Channel], listings: &[Listing]) -> String {
        let bytes = build_document_with_offset(channels, listings, central()).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_format_timestamp() {
        // Arrange
        let instant = utc(20, 0);

        // Act & Assert
        assert_eq!(format_timestamp(instant, central()), "20250928140000 -0600");
        assert_eq!(
            format_timestamp(instant, FixedOffset::east_opt(9 * 3600).unwrap()),
            "20250929050000 +0900"
        );
        assert_eq!(
            format_timestamp(instant, FixedOffset::east_opt(0).unwrap()),
            "20250928200000 +0000"
        );
    }

    #[test]
    fn test_single_channel_and_programme() {
        // Arrange
        let channels = [kets()];
        let listings = [listing("Test Show", "A & B")];

        // Act
        let xml = render(&channels, &listings);

        // Assert
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE tv SYSTEM \"xmltv.dtd\">\n<tv "));
        assert!(xml.ends_with("</tv>\n"));
        assert_eq!(xml.matches("<channel ").count(), 1);
        assert_eq!(xml.matches("<programme ").count(), 1);
        assert!(xml.contains("<channel id=\"98078\">"));
        assert!(xml.contains("<display-name>2.1 KETS-1</display-name>"));
        assert!(xml.contains(
            "<programme start=\"20250928140000 -0600\" stop=\"20250928150000 -0600\" channel=\"98078\">"
        ));
        assert!(xml.contains("<title lang=\"en\">Test Show</title>"));
        assert!(xml.contains("<desc lang=\"en\">A &amp; B</desc>"));
        assert!(!xml.contains("<sub-title"));
        assert!(!xml.contains("<icon"));
        assert!(!xml.contains("<episode-num"));
    }

    #[test]
    fn test_optional_elements_are_written_when_present() {
        // Arrange
        let channel = Channel {
            icon: Some(String::from("https://example.com/logo.png?a=1&b=2")),
            ..kets()
        };
        let full = Listing {
            sub_title: String::from("Pilot"),
            icon: Some(String::from("https://example.com/image/EP1")),
            program_id: String::from("EP000000060003"),
            ..listing("Test Show", "")
        };

        // Act
        let xml = render(&[channel], &[full]);

        // Assert
        assert!(xml.contains("<icon src=\"https://example.com/logo.png?a=1&amp;b=2\"/>"));
        assert!(xml.contains("<sub-title lang=\"en\">Pilot</sub-title>"));
        assert!(!xml.contains("<desc"));
        assert!(xml.contains("<icon src=\"https://example.com/image/EP1\"/>"));
        assert!(xml.contains("<episode-num system=\"dd_progid\">EP000000060003</episode-num>"));
    }

    #[test]
    fn test_all_special_characters_are_escaped() {
        // Arrange
        let channel = Channel {
            id: String::from("a\"b'c"),
            name: String::from("<Tom & Jerry's \"Show\">"),
            icon: None,
        };

        // Act
        let xml = render(&[channel], &[]);

        // Assert
        assert!(xml.contains("id=\"a&quot;b&apos;c\""));
        assert!(xml.contains(
            "<display-name>&lt;Tom &amp; Jerry&apos;s &quot;Show&quot;&gt;</display-name>"
        ));
    }

    #[test]
    fn test_escaping_round_trips_through_parser() {
        // Arrange
        let nasty = "<b>Fish & Chips</b> \"quoted\" it's";
        let channel = Channel {
            id: String::from("98078"),
            name: String::from(nasty),
            icon: Some(String::from("http://x/?a=1&b='2'")),
        };
        let full = Listing {
            sub_title: String::from(nasty),
            icon: Some(String::from("http://x/image/\"EP1\"")),
            program_id: String::from("EP<1>"),
            ..listing(nasty, nasty)
        };

        // Act
        let xml = render(&[channel], &[full]);
        let tv: Tv = quick_xml::de::from_str(&xml).unwrap();

        // Assert
        assert_eq!(tv.generator, GENERATOR_INFO_NAME);
        assert_eq!(tv.channels[0].id, "98078");
        assert_eq!(tv.channels[0].display_name, nasty);
        assert_eq!(tv.channels[0].icon.as_ref().unwrap().src, "http://x/?a=1&b='2'");
        let programme = &tv.programmes[0];
        assert_eq!(programme.channel, "98078");
        assert_eq!(programme.start, "20250928140000 -0600");
        assert_eq!(programme.stop, "20250928150000 -0600");
        assert_eq!(programme.title.text, nasty);
        assert_eq!(programme.sub_title.as_ref().unwrap().text, nasty);
        assert_eq!(programme.desc.as_ref().unwrap().text, nasty);
        assert_eq!(programme.icon.as_ref().unwrap().src, "http://x/image/\"EP1\"");
        assert_eq!(programme.episode_num.as_ref().unwrap().text, "EP<1>");
    }

    #[test]
    fn test_empty_document_is_well_formed() {
        // Arrange & Act
        let xml = render(&[], &[]);
        let tv: Tv = quick_xml::de::from_str(&xml).unwrap();

        // Assert
        assert!(tv.channels.is_empty());
        assert!(tv.programmes.is_empty());
        assert!(xml.contains("source-info-name=\"Schedules Direct\""));
    }

    #[test]
    fn test_channels_precede_listings_in_input_order() {
        // Arrange
        let channels = [
            kets(),
            Channel {
                id: String::from("44775"),
                name: String::from("2.2 KETS-2"),
                icon: None,
            },
        ];
        let listings = [listing("First", ""), listing("Second", "")];

        // Act
        let xml = render(&channels, &listings);

        // Assert
        let pos = |needle: &str| xml.find(needle).unwrap();
        assert!(pos("id=\"98078\"") < pos("id=\"44775\""));
        assert!(pos("id=\"44775\"") < pos("<programme "));
        assert!(pos(">First<") < pos(">Second<"));
    }
}
