//! 文档提取协作方边界
//!
//! 输入文件名（取扩展名）与字节，输出纯文本或 UnsupportedFormat。
//! 内置提取器支持纯文本类与 HTML（html2text）；PDF / DOCX 等由外部实现接入同一 trait。

use std::path::Path;

use crate::core::ExtractError;

/// 文档提取接口（同步）
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractError>;
}

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "json", "rst"];
const HTML_EXTENSIONS: &[&str] = &["html", "htm"];

/// 渲染 HTML 时的行宽
const HTML_WIDTH: usize = 120;

/// 内置提取器
#[derive(Debug, Default, Clone)]
pub struct BasicExtractor;

fn extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

impl DocumentExtractor for BasicExtractor {
    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, ExtractError> {
        let ext = extension(filename);
        if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            String::from_utf8(bytes.to_vec())
                .map_err(|e| ExtractError::Malformed(format!("{filename}: {e}")))
        } else if HTML_EXTENSIONS.contains(&ext.as_str()) {
            html2text::from_read(bytes, HTML_WIDTH)
                .map_err(|e| ExtractError::Malformed(format!("{filename}: {e}")))
        } else {
            Err(ExtractError::UnsupportedFormat(if ext.is_empty() {
                filename.to_string()
            } else {
                ext
            }))
        }
    }
}

/// 前 n 个字符（按字符而非字节截断）
pub fn snippet(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let text = BasicExtractor.extract("Notes.MD", b"# Graphs\nBFS and DFS").unwrap();
        assert!(text.contains("BFS"));
    }

    #[test]
    fn test_html_is_rendered() {
        let text = BasicExtractor
            .extract("page.html", b"<html><body><p>Dijkstra</p><script>x()</script></body></html>")
            .unwrap();
        assert!(text.contains("Dijkstra"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn test_unsupported_formats() {
        assert_eq!(
            BasicExtractor.extract("resume.pdf", b"%PDF-1.4"),
            Err(ExtractError::UnsupportedFormat("pdf".into()))
        );
        assert!(matches!(
            BasicExtractor.extract("noext", b"abc"),
            Err(ExtractError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        assert!(matches!(
            BasicExtractor.extract("a.txt", &[0xff, 0xfe, 0xfd]),
            Err(ExtractError::Malformed(_))
        ));
    }

    #[test]
    fn test_snippet_is_char_safe() {
        assert_eq!(snippet("héllo wörld", 4), "héll");
        assert_eq!(snippet("ab", 300), "ab");
    }
}
