// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_page_markup(sections: usize) -> String {
    let mut markup = String::from("<html><head><title>Bench</title></head><body>");
    for section in 0..sections {
        markup.push_str(&format!("<section><h2>Section {section}</h2>"));
        for para in 0..5 {
            markup.push_str(&format!(
                "<p>Paragraph {para} with <b>bold</b> and <i>italic</i> text that runs on for a while.</p>"
            ));
        }
        markup.push_str("<ul><li>One</li><li>Two</li><li>Three</li></ul></section>");
    }
    markup.push_str("</body></html>");
    markup
}
