//! Sample HTML documents for testing and demonstration.
//!
//! They range from markup a CSS2.1-class renderer takes as-is to pages
//! built entirely on constructs such an engine rejects.

/// Marketing page leaning on flexbox, grid, custom properties, web fonts,
/// media queries and pseudo-elements.
pub fn modern_landing_page() -> &'static str {
    r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Launch</title>
    <link rel="preconnect" href="https://fonts.gstatic.com">
    <link href="https://fonts.googleapis.com/css2?family=Inter:wght@400;700&display=swap" rel="stylesheet">
    <style>
        @font-face { font-family: "Brand"; src: url("/fonts/brand.woff2") format("woff2"); }
        :root { --accent: #4f46e5; --gap: 24px; }
        body { font-family: "Inter", sans-serif; margin: 0; color: #111827; }
        header.top { position: fixed; top: 0; width: 100%; box-shadow: 0 1px 4px rgba(0,0,0,.2); }
        .hero { display: flex; gap: var(--gap); padding: calc(2 * var(--gap)); }
        .hero > h1::after { content: "→"; }
        .grid { display: grid; grid-template-columns: repeat(3, 1fr); }
        .card:hover { transform: translateY(-2px); transition: transform .2s ease; }
        .cta { background: var(--accent); color: #ffffff; }
        @media (max-width: 600px) { .grid { display: block; } }
        @keyframes pulse { from { opacity: .5; } to { opacity: 1; } }
    </style>
</head>
<body>
    <header class="top"><strong>Launch</strong></header>
    <section class="hero" style="display: flex; gap: 12px; color: #1f2937">
        <h1>Ship documents that print</h1>
        <p>Every page renders, even on engines from another decade.</p>
    </section>
    <div class="grid">
        <div class="card"><h2>Fast</h2><p>Three tiers, tried in order.</p></div>
        <div class="card"><h2>Safe</h2><p>Failures stay with their document.</p></div>
        <div class="card"><h2>Simple</h2><p>One PDF at the end.</p></div>
    </div>
    <p class="cta" style="width: calc(100% - 2rem); background-color: #4f46e5; color: white">Get started</p>
</body>
</html>
"##
}

/// Invoice styled only through inline CSS2.1 declarations.
pub fn invoice() -> &'static str {
    r##"<html>
<head><title>Invoice #2024-001</title></head>
<body>
    <h1 style="color: #1a365d">Invoice #2024-001</h1>
    <p style="font-weight: bold">From:</p>
    <p>Acme Corp, 123 Business St, New York, NY 10001</p>
    <p style="font-weight: bold">To:</p>
    <p>Client Inc, 456 Client Ave, Los Angeles, CA 90001</p>
    <table style="width: 100%; border-collapse: collapse">
        <tr><th>Item</th><th>Qty</th><th>Price</th><th>Total</th></tr>
        <tr><td>Web Development</td><td>40</td><td>$150.00</td><td>$6,000.00</td></tr>
        <tr><td>Design Services</td><td>20</td><td>$125.00</td><td>$2,500.00</td></tr>
        <tr><td>Hosting (Annual)</td><td>1</td><td>$500.00</td><td>$500.00</td></tr>
    </table>
    <p style="text-align: right; font-size: 14pt; font-weight: bold">Total: $9,000.00</p>
</body>
</html>
"##
}

/// Stylesheet with an unterminated block and stray closing braces.
pub fn broken_stylesheet() -> &'static str {
    r##"<html>
<head>
    <style>
        }} body { color: #333333
        @media print { .x { display: flex;
        h1 { font-size: 20pt; }}}
    </style>
</head>
<body>
    <h1>Broken styles</h1>
    <p>The text must still come out.</p>
</body>
</html>
"##
}

/// Body content with no document shell at all.
pub fn headless_fragment() -> &'static str {
    r##"<h2>Quarterly notes</h2>
<p style="color: #555555; display: grid">Numbers are preliminary.</p>
<ul><li>Revenue up</li><li>Costs flat</li></ul>
"##
}

/// Multi-section report with lists, preformatted text and a data table.
pub fn table_report() -> &'static str {
    r##"<html>
<head>
    <title>Monthly Report</title>
    <style>
        h1 { color: #2d3748; }
        td, th { padding: 4px; border: 1px solid #cccccc; }
    </style>
</head>
<body>
    <h1>Monthly Report</h1>
    <p>This report covers <strong>March 2024</strong> and summarises <em>key</em> metrics.</p>
    <h2>Highlights</h2>
    <ul>
        <li>Revenue increased by 15%</li>
        <li>Customer satisfaction score: 4.8/5</li>
        <li>New users: 1,234</li>
    </ul>
    <h2>Breakdown</h2>
    <table>
        <tr><th>Region</th><th>Revenue</th><th>Growth</th></tr>
        <tr><td>North</td><td>$120,000</td><td>+12%</td></tr>
        <tr><td>South</td><td>$95,000</td><td>+18%</td></tr>
        <tr><td>East</td><td>$143,000</td><td>+9%</td></tr>
        <tr><td>West</td><td>$101,000</td><td>+21%</td></tr>
    </table>
    <h2>Raw export</h2>
    <pre>region,revenue
north,120000
south,95000</pre>
    <hr>
    <ol>
        <li>Review pricing</li>
        <li>Expand the south team</li>
    </ol>
</body>
</html>
"##
}

/// Every sample, keyed by a short name.
pub fn all() -> [(&'static str, &'static str); 5] {
    [
        ("modern", modern_landing_page()),
        ("invoice", invoice()),
        ("broken", broken_stylesheet()),
        ("fragment", headless_fragment()),
        ("report", table_report()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::sanitize_css;
    use crate::dom::{parse_html, stylesheets};
    use crate::render::unsupported_constructs;

    #[test]
    fn modern_page_is_rejected_by_strict_checks() {
        let problems = unsupported_constructs(&parse_html(modern_landing_page()));
        assert!(problems.len() >= 4, "{problems:?}");
    }

    #[test]
    fn plain_samples_pass_strict_checks() {
        for html in [invoice(), table_report()] {
            assert!(unsupported_constructs(&parse_html(html)).is_empty());
        }
    }

    #[test]
    fn broken_stylesheet_sanitizes_without_panicking() {
        let dom = parse_html(broken_stylesheet());
        let css = stylesheets(&dom).join("\n");
        let cleaned = sanitize_css(&css);
        assert!(!cleaned.contains("@media"));
        assert!(!cleaned.contains("flex"));
    }
}
