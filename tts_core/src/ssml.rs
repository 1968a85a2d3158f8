//! SSML document for the neural voice.

use crate::SpeechConfig;

/// Wrap `text` in a `<speak>` document using the configured voice and
/// speaking style. The text is escaped; model replies routinely contain `&`.
pub fn build_ssml(config: &SpeechConfig, text: &str) -> String {
    format!(
        r#"<speak version="1.0" xmlns:mstts="https://www.w3.org/2001/mstts" xml:lang="{lang}">
    <voice name="{voice}">
        <mstts:express-as style="{style}" styledegree="1">
		{text}
        </mstts:express-as>
    </voice>
</speak>"#,
        lang = escape_xml(&config.language),
        voice = escape_xml(&config.voice),
        style = escape_xml(&config.style),
        text = escape_xml(text),
    )
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
