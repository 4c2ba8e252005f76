//! GDAL private tags: `GDAL_METADATA` XML items and `GDAL_NODATA` text

/// One `<Item>` of a GDAL metadata document
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataItem {
    pub name: String,
    /// Band the item applies to; dataset-level items have none
    pub sample: Option<usize>,
    pub value: String,
}

/// Items of a `GDAL_METADATA` tag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GdalMetadata {
    items: Vec<MetadataItem>,
}

impl GdalMetadata {
    /// Parses the `<Item name=".." sample="..">value</Item>` elements of a
    /// metadata document. Unrecognised markup is ignored.
    pub fn parse(xml: &str) -> Self {
        let mut items = Vec::new();
        let mut rest = xml;

        while let Some(start) = rest.find("<Item") {
            rest = &rest[start + 5..];
            let Some(tag_end) = rest.find('>') else { break };
            let attributes = &rest[..tag_end];
            rest = &rest[tag_end + 1..];

            if attributes.ends_with('/') {
                continue;
            }
            let Some(value_end) = rest.find("</Item>") else { break };
            let value = &rest[..value_end];
            rest = &rest[value_end..];

            if let Some(name) = attribute(attributes, "name") {
                items.push(MetadataItem {
                    name: unescape(name),
                    sample: attribute(attributes, "sample").and_then(|s| s.parse().ok()),
                    value: unescape(value.trim()),
                });
            }
        }

        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[MetadataItem] {
        &self.items
    }

    /// Value of `name` for `sample`, falling back to a dataset-level item
    pub fn get(&self, name: &str, sample: usize) -> Option<&str> {
        let matching = |s: Option<usize>| {
            self.items
                .iter()
                .find(|item| item.name == name && item.sample == s)
                .map(|item| item.value.as_str())
        };
        matching(Some(sample)).or_else(|| matching(None))
    }

    pub fn get_f64(&self, name: &str, sample: usize) -> Option<f64> {
        self.get(name, sample)?.trim().parse().ok()
    }

    /// Sets or replaces an item
    pub fn set(&mut self, name: &str, sample: Option<usize>, value: String) {
        match self.items.iter_mut().find(|i| i.name == name && i.sample == sample) {
            Some(item) => item.value = value,
            None => self.items.push(MetadataItem {
                name: name.to_string(),
                sample,
                value,
            }),
        }
    }

    /// Serialises the items as a metadata document
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<GDALMetadata>\n");
        for item in &self.items {
            xml.push_str("  <Item name=\"");
            xml.push_str(&escape(&item.name));
            xml.push('"');
            if let Some(sample) = item.sample {
                xml.push_str(&format!(" sample=\"{}\" role=\"metadata\"", sample));
            }
            xml.push('>');
            xml.push_str(&escape(&item.value));
            xml.push_str("</Item>\n");
        }
        xml.push_str("</GDALMetadata>");
        xml
    }
}

fn attribute<'a>(attributes: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{}=\"", name);
    let mut search = attributes;
    loop {
        let pos = search.find(&needle)?;
        // Skip matches inside longer attribute names.
        let preceded_by_space = pos == 0 || search[..pos].ends_with(char::is_whitespace);
        let value = &search[pos + needle.len()..];
        if preceded_by_space {
            return value.find('"').map(|end| &value[..end]);
        }
        search = value;
    }
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Parses a `GDAL_NODATA` value (`"-9999"`, `"nan"`, ...)
pub fn parse_nodata(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    text.parse().ok()
}

/// Formats a no-data value the way GDAL writes it
pub fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<GDALMetadata>
  <Item name="STATISTICS_MAXIMUM" sample="0" role="metadata">255</Item>
  <Item name="STATISTICS_MINIMUM" sample="0" role="metadata">3</Item>
  <Item name="AREA_OR_POINT">Area</Item>
  <Item name="DESCRIPTION" sample="1" role="description">a &amp; b</Item>
</GDALMetadata>"#;

    #[test]
    fn test_parse_items() {
        let meta = GdalMetadata::parse(SAMPLE);
        assert_eq!(meta.items().len(), 4);
        assert_eq!(meta.get_f64("STATISTICS_MAXIMUM", 0), Some(255.0));
        assert_eq!(meta.get_f64("STATISTICS_MINIMUM", 0), Some(3.0));
        assert_eq!(meta.get("STATISTICS_MINIMUM", 1), None);
        assert_eq!(meta.get("AREA_OR_POINT", 2), Some("Area"));
        assert_eq!(meta.get("DESCRIPTION", 1), Some("a & b"));
    }

    #[test]
    fn test_write_then_parse() {
        let mut meta = GdalMetadata::default();
        meta.set("STATISTICS_MEAN", Some(0), "12.5".to_string());
        meta.set("STATISTICS_MEAN", Some(0), "13.5".to_string());
        meta.set("NOTE", None, "x < y".to_string());

        let parsed = GdalMetadata::parse(&meta.to_xml());
        assert_eq!(parsed, meta);
        assert_eq!(parsed.get_f64("STATISTICS_MEAN", 0), Some(13.5));
    }

    #[test]
    fn test_nodata() {
        assert_eq!(parse_nodata("-9999"), Some(-9999.0));
        assert_eq!(parse_nodata(" 0 "), Some(0.0));
        assert!(parse_nodata("nan").unwrap().is_nan());
        assert_eq!(parse_nodata("none"), None);
        assert_eq!(format_nodata(-9999.0), "-9999");
        assert_eq!(format_nodata(f64::NAN), "nan");
    }
}
