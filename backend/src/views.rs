use maud::{html, Markup, DOCTYPE};
use serde::Serialize;

use crate::admin::AdminOverview;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PersonView {
    pub name: String,
    pub disabled: bool,
}

fn page(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
            }
            body { (body) }
        }
    }
}

pub fn index(people: &[PersonView], pin_required: bool, flash: Option<&str>) -> Markup {
    page(
        "Secret Santa",
        html! {
            h1 { "Secret Santa" }
            @if let Some(message) = flash {
                p.flash.error { (message) }
            }
            form method="POST" action="/reveal" {
                select name="giver" required {
                    option value="" disabled selected { "Who are you?" }
                    @for person in people {
                        option value=(person.name) disabled[person.disabled] { (person.name) }
                    }
                }
                @if pin_required {
                    input type="password" name="pin" placeholder="PIN" required;
                }
                button type="submit" { "Reveal" }
            }
        },
    )
}

pub fn reveal(giver: &str, receiver: &str) -> Markup {
    page(
        "Your Secret Santa",
        html! {
            h1 { (giver) ", you give a gift to:" }
            p.receiver { (receiver) }
            p { "Keep it secret. This page will not be shown again." }
        },
    )
}

pub fn admin(overview: &AdminOverview, key: &str) -> Markup {
    page(
        "Secret Santa admin",
        html! {
            h2 { "Assignments" }
            ul {
                @for pair in &overview.pairs {
                    li { (pair.giver) " → " (pair.receiver) }
                }
            }
            h2 { "Already revealed" }
            ul {
                @for record in &overview.revealed {
                    li { (record.giver) " (" (record.revealed_at.to_rfc3339()) ")" }
                }
            }
            form method="POST" action="/admin/reset" {
                input type="hidden" name="admin_key" value=(key);
                button type="submit" { "Reset draw" }
            }
        },
    )
}

pub fn error_page(message: &str) -> Markup {
    page(
        "Error",
        html! {
            h1 { "Error" }
            p { (message) }
        },
    )
}
