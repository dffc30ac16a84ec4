// HTML form and link discovery over rendered pages.
//
// Pages are parsed with `scraper`. A page may carry several forms (site
// search, login, the report form); all of them are returned and the session
// picks the one owning the fields it fills.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{EnrichError, Result};

static FORM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("valid selector"));

static FIELD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("input[name], select[name], textarea[name]").expect("valid selector")
});

static OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option").expect("valid selector"));

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    /// Absolute submission URL.
    pub action: Url,
    pub method: String,
    /// Named fields in document order with their current values.
    pub fields: Vec<(String, String)>,
}

impl Form {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    /// Set a field's value. Fails if the form has no field by that name.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => {
                *v = value.to_string();
                Ok(())
            }
            None => Err(EnrichError::FormInteraction(format!(
                "form at {} has no field named {name:?}",
                self.action
            ))),
        }
    }

    /// The URL a GET submission of the current field values resolves to.
    pub fn submission_url(&self) -> Url {
        let mut url = self.action.clone();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str())));
        url
    }
}

/// Initial value of a named control, as a browser would submit it.
fn control_value(control: &ElementRef) -> String {
    let element = control.value();
    match element.name() {
        "textarea" => control.text().collect(),
        "select" => {
            let options: Vec<ElementRef> = control.select(&OPTION_SELECTOR).collect();
            options
                .iter()
                .find(|o| o.value().attr("selected").is_some())
                .or_else(|| options.first())
                .map(|o| {
                    o.value()
                        .attr("value")
                        .map(str::to_string)
                        .unwrap_or_else(|| o.text().collect::<String>().trim().to_string())
                })
                .unwrap_or_default()
        }
        _ => element.attr("value").unwrap_or_default().to_string(),
    }
}

fn read_form(form: ElementRef, base: &Url) -> Form {
    let element = form.value();
    let action = match element.attr("action").map(str::trim) {
        Some(raw) if !raw.is_empty() => base.join(raw).unwrap_or_else(|_| base.clone()),
        _ => base.clone(),
    };
    let method = element.attr("method").unwrap_or("get").to_ascii_lowercase();

    let mut fields: Vec<(String, String)> = Vec::new();
    for control in form.select(&FIELD_SELECTOR) {
        let Some(name) = control.value().attr("name") else {
            continue;
        };
        let kind = control
            .value()
            .attr("type")
            .unwrap_or("text")
            .to_ascii_lowercase();
        if matches!(kind.as_str(), "submit" | "button" | "reset" | "image") {
            continue;
        }
        if !fields.iter().any(|(n, _)| n == name) {
            fields.push((name.to_string(), control_value(&control)));
        }
    }

    Form {
        action,
        method,
        fields,
    }
}

/// Every form on the page in document order, actions resolved against
/// `page_url`. Empty when the URL is invalid or the page has no form.
pub fn parse_forms(html: &str, page_url: &str) -> Vec<Form> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&FORM_SELECTOR)
        .map(|form| read_form(form, &base))
        .collect()
}

/// Absolute URL of the first link whose visible text contains `text`
/// (case-insensitive). Relative hrefs resolve against `page_url`.
pub fn find_link_by_text(html: &str, page_url: &str, text: &str) -> Option<String> {
    let base = Url::parse(page_url).ok();
    let needle = text.to_lowercase();
    let document = Html::parse_document(html);

    for anchor in document.select(&ANCHOR_SELECTOR) {
        let label: String = anchor.text().collect();
        if !label.to_lowercase().contains(&needle) {
            continue;
        }
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        let resolved = match &base {
            Some(base) => base.join(href).ok(),
            None => Url::parse(href).ok(),
        };
        if let Some(url) = resolved {
            return Some(url.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://mcdc.missouri.edu/applications/capsACS.html";

    const CAPS_FORM: &str = r#"
        <html><body>
        <form name="capsform" action="/cgi-bin/broker" method="get">
          <input type="hidden" name="_PROGRAM" value="apps.capsACS.sas">
          <input type="text" name="latitude" value="">
          <input type="text" name='longitude'>
          <input type="text" name="radii" value="1 2 3">
          <input type="submit" name="go" value="Generate Report">
        </form>
        </body></html>"#;

    fn only_form(html: &str) -> Form {
        let mut forms = parse_forms(html, PAGE);
        assert_eq!(forms.len(), 1);
        forms.remove(0)
    }

    #[test]
    fn form_fields_and_action_are_discovered() {
        let form = only_form(CAPS_FORM);
        assert_eq!(form.action.as_str(), "https://mcdc.missouri.edu/cgi-bin/broker");
        assert_eq!(form.method, "get");
        let names: Vec<&str> = form.fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["_PROGRAM", "latitude", "longitude", "radii"]);
        assert!(form.has_field("radii"));
        assert!(!form.has_field("go"));
    }

    #[test]
    fn unquoted_attributes_are_read() {
        let mut form = only_form(
            "<form action=/cgi-bin/broker method=GET>\
             <input type=text name=latitude size=10>\
             <input type=text name=longitude></form>",
        );
        assert_eq!(form.action.as_str(), "https://mcdc.missouri.edu/cgi-bin/broker");
        assert_eq!(form.method, "get");
        form.set("latitude", "42.65").unwrap();
        assert!(form.has_field("longitude"));
    }

    #[test]
    fn every_form_on_the_page_is_returned_in_order() {
        let html = format!(
            r#"<form action="/search"><input name="q"></form>{CAPS_FORM}"#
        );
        let forms = parse_forms(&html, PAGE);
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].action.path(), "/search");
        assert!(forms[1].has_field("latitude"));
    }

    #[test]
    fn select_and_textarea_contribute_their_values() {
        let form = only_form(
            r#"<form><select name="units"><option value="mi">Miles</option>
               <option value="km" selected>Kilometers</option></select>
               <textarea name="note">hello</textarea></form>"#,
        );
        assert_eq!(
            form.fields,
            vec![
                ("units".to_string(), "km".to_string()),
                ("note".to_string(), "hello".to_string()),
            ]
        );
        assert_eq!(form.action.as_str(), PAGE);
    }

    #[test]
    fn filled_form_serializes_in_field_order() {
        let mut form = only_form(CAPS_FORM);
        form.set("latitude", "42.65").unwrap();
        form.set("longitude", "73.75").unwrap();
        form.set("radii", "5 10 15 20 25").unwrap();
        assert_eq!(
            form.submission_url().as_str(),
            "https://mcdc.missouri.edu/cgi-bin/broker?_PROGRAM=apps.capsACS.sas&latitude=42.65&longitude=73.75&radii=5+10+15+20+25"
        );
    }

    #[test]
    fn unknown_field_is_a_form_interaction_error() {
        let mut form = only_form(CAPS_FORM);
        assert!(matches!(
            form.set("zipcode", "12345"),
            Err(EnrichError::FormInteraction(_))
        ));
    }

    #[test]
    fn page_without_form() {
        assert!(parse_forms("<p>maintenance</p>", PAGE).is_empty());
    }

    #[test]
    fn link_found_by_text_and_resolved() {
        let html = r#"
            <a href="/tmp/report.html">HTML report</a>
            <a href=/tmp/capsacs_1234.csv><b>CSV</b> file</a>"#;
        assert_eq!(
            find_link_by_text(html, "https://mcdc.missouri.edu/cgi-bin/broker", "csv file").as_deref(),
            Some("https://mcdc.missouri.edu/tmp/capsacs_1234.csv")
        );
    }

    #[test]
    fn absolute_link_kept() {
        let html = r#"<a class="dl" href='https://files.example.org/x.csv'>Download CSV file</a>"#;
        assert_eq!(
            find_link_by_text(html, "https://mcdc.missouri.edu/", "CSV file").as_deref(),
            Some("https://files.example.org/x.csv")
        );
    }

    #[test]
    fn no_matching_link() {
        let html = r#"<a href="/x.pdf">PDF file</a>"#;
        assert!(find_link_by_text(html, "https://mcdc.missouri.edu/", "CSV file").is_none());
    }
}
