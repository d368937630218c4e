//! HTML for the three wizard screens. Presentational only: reads a [`Page`], never a session.

use phodong_core::{
    CameraView, ConfigView, Genre, Notice, Page, Purpose, SceneCard, StepMark, StoryView, View,
};
use std::fmt::Write as _;

const STYLE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/phodong.css"));

const BEAR_SVG: &str = r##"<svg width="80" height="80" viewBox="0 0 100 100" fill="none" xmlns="http://www.w3.org/2000/svg">
  <circle cx="50" cy="55" r="35" fill="#D6B898"/>
  <circle cx="35" cy="25" r="12" fill="#D6B898"/>
  <circle cx="65" cy="25" r="12" fill="#D6B898"/>
  <circle cx="35" cy="25" r="6" fill="#EAC7A8"/>
  <circle cx="65" cy="25" r="6" fill="#EAC7A8"/>
  <ellipse cx="50" cy="60" rx="14" ry="10" fill="#FFF0F5"/>
  <circle cx="50" cy="56" r="4" fill="#5D4037"/>
  <circle cx="42" cy="48" r="3" fill="#333"/>
  <circle cx="58" cy="48" r="3" fill="#333"/>
  <path d="M50 60V65" stroke="#5D4037" stroke-width="2" stroke-linecap="round"/>
  <path d="M46 65C46 65 48 68 50 68C52 68 54 65 54 65" stroke="#5D4037" stroke-width="2" stroke-linecap="round"/>
</svg>"##;

pub const THE_END: &str = "🌟 The End 🌟";

/// Full document for the current page.
pub fn render_page(app_name: &str, page: &Page<'_>) -> String {
    let screen = match &page.view {
        View::Config(v) => render_config(v),
        View::Camera(v) => render_camera(v),
        View::Story(v) => render_story(v),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>🧸 {title}</title>
<style>{style}</style>
</head>
<body>
<main>
{header}
{stepbar}
{notice}
{screen}
</main>
</body>
</html>"#,
        title = html_escape(app_name),
        style = STYLE,
        header = render_header(app_name),
        stepbar = render_stepbar(&page.marks),
        notice = page.notice.as_ref().map(render_notice).unwrap_or_default(),
        screen = screen,
    )
}

fn render_header(app_name: &str) -> String {
    format!(
        r#"<div class="phodong-header">{}<h1>{}</h1><p>My own storybook where things come alive</p></div>"#,
        BEAR_SVG,
        html_escape(app_name)
    )
}

pub fn render_stepbar(marks: &[(phodong_core::Step, StepMark); 3]) -> String {
    let mut out = String::from(r#"<div class="step-bar">"#);
    for (i, (step, mark)) in marks.iter().enumerate() {
        let class = match mark {
            StepMark::Done => "done",
            StepMark::Active => "active",
            StepMark::Pending => "",
        };
        let _ = write!(
            out,
            r#"<div class="step-item {}"><div class="step-dot">{}</div> {}</div>"#,
            class,
            i + 1,
            step.label()
        );
        if i + 1 < marks.len() {
            out.push_str(r#"<div class="step-line"></div>"#);
        }
    }
    out.push_str("</div>");
    out
}

fn render_notice(notice: &Notice) -> String {
    let (class, text) = match notice {
        Notice::Warning(t) => ("notice notice-warning", t),
        Notice::Error(t) => ("notice notice-error", t),
    };
    format!(r#"<div class="{}">{}</div>"#, class, html_escape(text))
}

fn render_config(view: &ConfigView<'_>) -> String {
    let ages: String = view
        .ages
        .iter()
        .map(|&age| {
            let selected = if age == view.draft.age { " selected" } else { "" };
            format!(r#"<option value="{age}"{selected}>{age}</option>"#)
        })
        .collect();
    let genres: String = Genre::ALL
        .iter()
        .map(|&g| option_button("genre", g.slug(), g.label(), g == view.selected_genre))
        .collect();
    let purposes: String = Purpose::ALL
        .iter()
        .map(|&p| option_button("purpose", p.slug(), p.label(), p == view.selected_purpose))
        .collect();

    format!(
        r#"<form method="post" action="/config" class="phodong-card">
<button type="submit" name="action" value="start" class="default-submit" tabindex="-1" aria-hidden="true"></button>
<p class="section-label">👤 About the child</p>
<div class="field-row">
<label>Hero's name<input type="text" name="child_name" value="{child}" placeholder="e.g. Minjun" autocomplete="off"></label>
<label>Companion's name<input type="text" name="companion_name" value="{companion}" placeholder="e.g. Pororo" autocomplete="off"></label>
<label>Age<select name="age">{ages}</select></label>
</div>
<p class="section-label">📚 Genre</p>
<div class="option-row">{genres}</div>
<p class="section-label">🎯 What the story is for</p>
<div class="option-row">{purposes}</div>
<div class="center-row"><button type="submit" name="action" value="start" class="primary">✨ Start the adventure!</button></div>
</form>"#,
        child = html_escape(&view.draft.child_name),
        companion = html_escape(&view.draft.companion_name),
        ages = ages,
        genres = genres,
        purposes = purposes,
    )
}

fn option_button(name: &str, value: &str, label: &str, selected: bool) -> String {
    let class = if selected { "option selected" } else { "option" };
    format!(
        r#"<button type="submit" name="{}" value="{}" class="{}">{}</button>"#,
        name,
        value,
        class,
        html_escape(label)
    )
}

fn render_camera(view: &CameraView<'_>) -> String {
    let n = view.cards.len();
    let disabled = if view.in_flight { " disabled" } else { "" };
    let capture_hint = if view.in_flight {
        "🔍 Looking closely at your photo..."
    } else {
        "📷 Take this photo"
    };

    let friends = if view.cards.is_empty() {
        r#"<div class="empty-friends"><div>🔍</div><p>No story friends found yet</p></div>"#.to_string()
    } else {
        let cards: String = view
            .cards
            .iter()
            .map(|c| {
                render_card(
                    c,
                    &format!("✨ {}", c.character_name),
                    "badge-blue",
                    &format!("{}...", truncate_chars(&c.magic_power, 15)),
                )
            })
            .collect();
        format!(r#"<p class="section-label">🌟 Story friends found</p>{}"#, cards)
    };

    format!(
        r#"<div class="scene-counter">📸 {n} / {max} scenes done</div>
<progress value="{n}" max="{max}"></progress>
<div class="camera-guide">📷 Point the camera at an object and press <b>Take this photo</b><br><span>Looking for {child}'s story friends!</span></div>
<div class="camera-grid">
<div>
<form method="post" action="/photo" enctype="multipart/form-data" class="capture-form" onsubmit="this.querySelector('button').disabled = true;">
<input type="file" name="photo" accept="image/*" capture="environment" required{disabled}>
<button type="submit" class="primary"{disabled}>{hint}</button>
</form>
</div>
<div>{friends}</div>
</div>
<form method="post" action="/restart" class="center-row"><button type="submit">← Back to the start</button></form>"#,
        n = n,
        max = view.max_scenes,
        child = html_escape(view.profile.child_name()),
        disabled = disabled,
        hint = capture_hint,
        friends = friends,
    )
}

fn render_story(view: &StoryView<'_>) -> String {
    let profile = view.profile;
    let cards: String = view
        .cards
        .iter()
        .map(|c| {
            render_card(
                c,
                &c.character_name,
                "badge-yellow",
                &truncate_chars(&c.personality, 20),
            )
        })
        .collect();

    format!(
        r#"<div class="phodong-card" style="text-align:center; margin-bottom:16px;">
<div class="story-meta">Age {age} · {genre} · {purpose}</div>
<div class="story-title">{title}</div>
<div class="story-heroes">Starring: {child} &amp; {companion}</div>
</div>
<div class="story-body">
<div class="story-text">{body}</div>
<div class="the-end">{the_end}</div>
</div>
<details><summary>📖 Meet the characters</summary>{cards}</details>
<div class="story-actions">
<a class="button" href="/story.txt" download>📥 Save the story</a>
<form method="post" action="/reset"><button type="submit" class="primary">🔄 Make a new story</button></form>
</div>"#,
        age = profile.age(),
        genre = profile.genre().label(),
        purpose = profile.purpose().label(),
        title = html_escape(&view.story.title),
        child = html_escape(profile.child_name()),
        companion = html_escape(profile.companion_name()),
        body = html_escape(&view.story.body),
        the_end = THE_END,
        cards = cards,
    )
}

/// Photo on the left, name/badges/dialogue on the right.
fn render_card(card: &SceneCard, heading: &str, second_badge: &str, second_text: &str) -> String {
    let photo = if card.photo.data_b64().is_empty() {
        String::new()
    } else {
        format!(
            r#"<img src="{}" alt="{}">"#,
            card.photo.data_uri(),
            html_escape(&card.character_type)
        )
    };
    format!(
        r#"<div class="char-row"><div>{photo}</div><div class="char-card"><div class="char-name">{name}</div><div class="badge-row"><span class="badge badge-pink">{kind}</span><span class="badge {badge}">{second}</span></div><div class="char-dialogue">"{dialogue}"</div></div></div>"#,
        photo = photo,
        name = html_escape(heading),
        kind = html_escape(&card.character_type),
        badge = second_badge,
        second = html_escape(second_text),
        dialogue = html_escape(&card.dialogue),
    )
}

fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
