//! Small text helpers shared by the tester and the providers

/// Normalize a block of text to end in exactly one newline.
pub fn ensure_trailing_newline(s: &str) -> String {
    let mut out = s.trim_end_matches('\n').to_string();
    out.push('\n');
    out
}

/// Decode the handful of HTML entities that show up inside `<pre>` sample
/// blocks. Anything fancier than this is a markup change we do not chase.
pub fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Turn `<br>` variants into newlines and drop every other tag. Good enough
/// for the `<pre>` blocks we feed it.
pub fn strip_tags(s: &str) -> String {
    let with_breaks = s
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("<br>", "\n");
    let mut out = String::with_capacity(with_breaks.len());
    let mut in_tag = false;
    for ch in with_breaks.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_trailing_newline() {
        assert_eq!(ensure_trailing_newline("1 2"), "1 2\n");
        assert_eq!(ensure_trailing_newline("1 2\n"), "1 2\n");
        assert_eq!(ensure_trailing_newline("1 2\n\n\n"), "1 2\n");
        assert_eq!(ensure_trailing_newline(""), "\n");
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("a &lt;= b &amp;&amp; c"), "a <= b && c");
        assert_eq!(unescape_html("say &quot;hi&quot;"), "say \"hi\"");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("1 2<br/>3 4"), "1 2\n3 4");
        assert_eq!(
            strip_tags("<div class=\"line\">a</div><span>b</span>"),
            "ab"
        );
    }
}
