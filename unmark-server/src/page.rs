//! Server-rendered HTML for the browser form.

use maud::{DOCTYPE, Markup, PreEscaped, html};
use unmark_pipeline::PipelineOutcome;
use uuid::Uuid;

const STYLE: &str = "\
body { font-family: system-ui, sans-serif; max-width: 40rem; margin: 3rem auto; padding: 0 1rem; }
fieldset { border: 1px solid #ccc; padding: 1rem; margin-bottom: 1rem; }
input[type=url] { width: 100%; }
.skipped { color: #8a5a00; }
";

fn layout(body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "unmark" }
                style { (PreEscaped(STYLE)) }
            }
            body { (body) }
        }
    }
}

pub fn form_page() -> Markup {
    layout(html! {
        h1 { "Remove listing watermarks" }
        form method="post" action="/" enctype="multipart/form-data" {
            fieldset {
                legend { "Listing page" }
                input type="url" name="url" placeholder="https://dealer.example/used/fiat-panda/12345";
            }
            fieldset {
                legend { "or a single image" }
                input type="file" name="file" accept="image/jpeg,image/png,image/webp";
            }
            button type="submit" { "Process" }
        }
    })
}

/// Summary page linking to the finished archive.
pub fn result_page(job_id: Uuid, outcome: &PipelineOutcome) -> Markup {
    layout(html! {
        h1 { "Done" }
        p { (outcome.processed) " of " (outcome.attempted) " images processed." }
        p {
            a href={ "/download/" (job_id) } download {
                "Download " (outcome.archive.filename)
            }
        }
        @if !outcome.skipped.is_empty() {
            ul.skipped {
                @for skipped in &outcome.skipped {
                    li { (skipped.filename) ": " (skipped.reason) }
                }
            }
        }
        p { a href="/" { "Process another" } }
    })
}
