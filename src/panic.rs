//! Helpers for reporting recovered panics.
//!
//! 用于报告已恢复 panic 的辅助函数。

use std::any::Any;

/// Extracts a readable message from a panic payload.
///
/// 从 panic 载荷中提取可读的消息。
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload: Box<dyn Any + Send> = Box::new(format!("owned {}", 7));
        assert_eq!(panic_message(payload.as_ref()), "owned 7");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
    }
}
