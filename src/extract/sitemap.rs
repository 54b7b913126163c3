//! Sitemap parsing
//!
//! Handles both sitemap indexes (`<sitemapindex>`) and URL sets (`<urlset>`).

use quick_xml::events::Event;
use quick_xml::Reader;

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sitemap {
    /// Locations of child sitemaps
    Index(Vec<String>),
    /// Locations of pages
    UrlSet(Vec<String>),
}

/// Parses sitemap XML into its `<loc>` entries
///
/// # Returns
///
/// * `Ok(Sitemap::Index)` - The root element was `sitemapindex`
/// * `Ok(Sitemap::UrlSet)` - Any other root element
/// * `Err(quick_xml::Error)` - Malformed XML
pub fn parse_sitemap(xml: &str) -> Result<Sitemap, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut is_index = false;
    let mut in_loc = false;
    let mut locations = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"loc" => in_loc = true,
                _ => {}
            },
            Event::Text(text) if in_loc => {
                let location = text.unescape()?.trim().to_string();
                if !location.is_empty() {
                    locations.push(location);
                }
            }
            Event::CData(data) if in_loc => {
                let location = String::from_utf8_lossy(&data.into_inner()).trim().to_string();
                if !location.is_empty() {
                    locations.push(location);
                }
            }
            Event::End(element) if element.local_name().as_ref() == b"loc" => in_loc = false,
            Event::Eof => break,
            _ => {}
        }
    }

    if is_index {
        Ok(Sitemap::Index(locations))
    } else {
        Ok(Sitemap::UrlSet(locations))
    }
}

/// Returns true if a sitemap page URL should be crawled
///
/// A URL matches when `pattern` occurs anywhere in it.
pub fn matches_rule(location: &str, pattern: &str) -> bool {
    location.contains(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <sitemap><loc>https://www.kinobox.cz/sitemap-films-1.xml</loc></sitemap>
              <sitemap><loc>https://www.kinobox.cz/sitemap-people-1.xml</loc></sitemap>
            </sitemapindex>"#;

        assert_eq!(
            parse_sitemap(xml).unwrap(),
            Sitemap::Index(vec![
                "https://www.kinobox.cz/sitemap-films-1.xml".to_string(),
                "https://www.kinobox.cz/sitemap-people-1.xml".to_string(),
            ])
        );
    }

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <url><loc>https://www.kinobox.cz/film/1-pelisky</loc><lastmod>2024-01-01</lastmod></url>
              <url><loc><![CDATA[https://www.kinobox.cz/osoba/5-jiri-kodet]]></loc></url>
              <url><loc>https://www.kinobox.cz/film/2-a?x=1&amp;y=2</loc></url>
            </urlset>"#;

        let Sitemap::UrlSet(urls) = parse_sitemap(xml).unwrap() else {
            panic!("expected urlset");
        };
        assert_eq!(
            urls,
            vec![
                "https://www.kinobox.cz/film/1-pelisky",
                "https://www.kinobox.cz/osoba/5-jiri-kodet",
                "https://www.kinobox.cz/film/2-a?x=1&y=2",
            ]
        );
    }

    #[test]
    fn test_malformed_sitemap() {
        assert!(parse_sitemap("<urlset><url><loc>x</url></urlset>").is_err());
    }

    #[test]
    fn test_matches_rule() {
        assert!(matches_rule("https://www.kinobox.cz/film/1-pelisky", "/film/"));
        assert!(!matches_rule("https://www.kinobox.cz/osoba/5", "/film/"));
    }
}
