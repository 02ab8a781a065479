//! Meme command parsing.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref URL: Regex = Regex::new(r"(?i)(https?://[^\s]+)").expect("url pattern");
}

/// Background for a captioned `!텍스트`/`!사진` meme.
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// The sender's uploaded image, or the default template.
    Personal,
    Url(String),
    Search(String),
}

/// A parsed meme command.
#[derive(Debug, Clone, PartialEq)]
pub enum MemeRequest {
    Caption { background: Background, text: String },
    Parrot(String),
    Stop(String),
    Erase(String),
    Proceed(String),
    Retort { top: String, bottom: String },
    /// Caption the image of the message being replied to.
    CaptionSource(String),
    Upload(String),
    Usage(&'static str),
}

pub const RETORT_USAGE: &str = "형식: !말대꾸 위문구##아래문구";

/// Parse a meme command from its first token and the rest of the message.
/// Returns `None` for anything that is not a meme command.
pub fn parse(command: &str, param: &str) -> Option<MemeRequest> {
    let request = match command {
        "!텍스트" => caption(param)?,
        "!사진" => MemeRequest::Caption {
            background: Background::Search(param.to_string()),
            text: "  ".to_string(),
        },
        "!껄무새" => MemeRequest::Parrot(param.to_string()),
        "!멈춰" => MemeRequest::Stop(param.to_string()),
        "!지워" => MemeRequest::Erase(param.to_string()),
        "!진행" => MemeRequest::Proceed(param.to_string()),
        "!말대꾸" => match param.split_once("##") {
            Some((top, bottom)) => MemeRequest::Retort {
                top: top.to_string(),
                bottom: bottom.to_string(),
            },
            None => MemeRequest::Usage(RETORT_USAGE),
        },
        "!텍스트추가" => MemeRequest::CaptionSource(param.to_string()),
        "!업로드" => MemeRequest::Upload(param.to_string()),
        _ => return None,
    };
    Some(request)
}

fn caption(param: &str) -> Option<MemeRequest> {
    let parts: Vec<&str> = param.split("##").collect();
    let (background, text) = match parts.as_slice() {
        [text] => (Background::Personal, *text),
        [url, text] => (Background::Url(url.trim().to_string()), *text),
        [_, query, text] => (Background::Search(query.trim().to_string()), *text),
        _ => return None,
    };
    Some(MemeRequest::Caption {
        background,
        text: text.to_string(),
    })
}

/// First `http(s)://` link in `text`.
pub fn extract_first_url(text: &str) -> Option<String> {
    URL.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_forms() {
        assert_eq!(
            parse("!텍스트", "안녕"),
            Some(MemeRequest::Caption {
                background: Background::Personal,
                text: "안녕".to_string()
            })
        );
        assert_eq!(
            parse("!텍스트", "https://a.b/c.jpg##안녕"),
            Some(MemeRequest::Caption {
                background: Background::Url("https://a.b/c.jpg".to_string()),
                text: "안녕".to_string()
            })
        );
        assert_eq!(
            parse("!텍스트", "검색##고양이##냥"),
            Some(MemeRequest::Caption {
                background: Background::Search("고양이".to_string()),
                text: "냥".to_string()
            })
        );
        assert_eq!(parse("!텍스트", "a##b##c##d"), None);
    }

    #[test]
    fn photo_and_retort() {
        assert_eq!(
            parse("!사진", "강아지"),
            Some(MemeRequest::Caption {
                background: Background::Search("강아지".to_string()),
                text: "  ".to_string()
            })
        );
        assert_eq!(
            parse("!말대꾸", "위##아래"),
            Some(MemeRequest::Retort {
                top: "위".to_string(),
                bottom: "아래".to_string()
            })
        );
        assert_eq!(parse("!말대꾸", "위만"), Some(MemeRequest::Usage(RETORT_USAGE)));
        assert_eq!(parse("/파티", "10"), None);
    }

    #[test]
    fn finds_first_url() {
        assert_eq!(
            extract_first_url("이거 봐 HTTPS://x.com/a.png 그리고 http://y"),
            Some("HTTPS://x.com/a.png".to_string())
        );
        assert_eq!(extract_first_url("링크 없음"), None);
    }
}
