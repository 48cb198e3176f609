use cheddar_client::{
    api::{Story, Time},
    Comment, ThreadView,
};

const INDENT: &str = "  ";

/// Short relative age, eg. `5m` or `3d`
pub fn age(time: Option<Time>, now: Time) -> String {
    let time = match time {
        Some(t) => t,
        None => return String::from("?"),
    };
    let secs = (now - time).num_seconds().max(0);
    match secs {
        s if s >= 86400 => format!("{}d", s / 86400),
        s if s >= 3600 => format!("{}h", s / 3600),
        s if s >= 60 => format!("{}m", s / 60),
        s => format!("{s}s"),
    }
}

/// Decode one entity body, as found between `&` and `;`
fn entity(name: &str) -> Option<char> {
    let numeric = |digits: &str, radix| u32::from_str_radix(digits, radix).ok();
    let code = match name {
        "amp" => return Some('&'),
        "lt" => return Some('<'),
        "gt" => return Some('>'),
        "quot" => return Some('"'),
        "apos" => return Some('\''),
        "nbsp" => return Some(' '),
        n => match n.strip_prefix("#x").or_else(|| n.strip_prefix("#X")) {
            Some(hex) => numeric(hex, 16)?,
            None => numeric(n.strip_prefix('#')?, 10)?,
        },
    };
    char::from_u32(code)
}

fn decode_entities(text: &str) -> String {
    let mut res = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        res.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        match tail.find(';').and_then(|end| Some((end, entity(&tail[..end])?))) {
            Some((end, c)) => {
                res.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                res.push('&');
                rest = tail;
            }
        }
    }
    res.push_str(rest);
    res
}

/// Poor man's rendering of the html subset used in comment bodies
fn plain_text(html: &str) -> String {
    let mut res = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.replace("<p>", " ").chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => res.push(c),
            _ => (),
        }
    }
    decode_entities(&res)
}

pub fn story_line(story: &Story, now: Time) -> String {
    format!(
        "[{}] {} ({}) | {} points by {} {} ago | {} comments",
        story.badge,
        story.title,
        story.short_url,
        story.score,
        story.by.as_deref().unwrap_or("?"),
        age(story.time, now),
        story.comment_count,
    )
}

fn comment_line(comment: &Comment, now: Time) -> String {
    let marker = match comment.hide_children {
        true => format!(" [+{}]", comment.hidden_children_count),
        false => String::new(),
    };
    format!(
        "{}{} {}{}: {}",
        INDENT.repeat(comment.hierarchy),
        comment.author.as_deref().unwrap_or("?"),
        age(comment.time, now),
        marker,
        plain_text(&comment.body),
    )
}

/// Header line followed by one line per visible comment
pub fn thread(view: &ThreadView, now: Time) -> Vec<String> {
    let mut res = vec![story_line(view.story(), now)];
    res.extend(view.rows().map(|r| comment_line(r.comment, now)));
    res
}
