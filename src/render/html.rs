//! HTML escaping and page wrapping.

use pulldown_cmark_escape::escape_html;

/// Escape text for use in HTML element content or a double-quoted attribute.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String cannot fail
    let _ = escape_html(&mut out, text);
    out
}

/// Wrap a rendered body into a standalone page.
pub fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <title>{}</title>\n\
         <style>\n\
         body {{ max-width: 50em; margin: 2em auto; font-family: sans-serif; line-height: 1.5; }}\n\
         .math-block {{ text-align: center; margin: 1em 0; }}\n\
         .writer-message {{ border-bottom: 1px solid #ddd; padding: 1em 0; }}\n\
         pre {{ background: #f6f8fa; padding: 0.75em; overflow-x: auto; }}\n\
         </style>\n\
         </head>\n\
         <body>\n\
         {}\
         </body>\n\
         </html>\n",
        escape(title),
        body
    )
}
