//! Identifiers (BusId, HandlerId).
//!
//! # 二種類の ID
//! - **BusId**: Bus インスタンスごとの ULID。ログの相関用
//! - **HandlerId**: Handler の同一性。同じ message type 内での二重登録検出にのみ使う

use serde::{Deserialize, Serialize};
use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use ulid::Ulid;

/// Bus インスタンスの識別子
///
/// 複数の Bus を同一プロセスで動かしたとき、tracing の出力を区別するために使います。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BusId(Ulid);

impl BusId {
    pub fn generate() -> Self {
        Self(Ulid::new())
    }

    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus-{}", self.0)
    }
}

/// Handler の同一性
///
/// - `of::<T>()`: handler の型（`TypeId`）で比較する。名前は表示用の `type_name`
/// - `new(..)`: 呼び出し側が渡した文字列で比較する
///
/// `fn` item の名前は関数パスそのもの（例: `my_app::audit`）。
/// closure は名前が `my_app::main::{{closure}}` で重なっても、型が別なので別 ID になります。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandlerId {
    name: Cow<'static, str>,
    #[serde(skip)]
    type_id: Option<TypeId>,
}

impl HandlerId {
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: id.into(),
            type_id: None,
        }
    }

    /// handler の型から HandlerId を作る
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: Cow::Borrowed(std::any::type_name::<T>()),
            type_id: Some(TypeId::of::<T>()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl From<&'static str> for HandlerId {
    fn from(id: &'static str) -> Self {
        Self::new(id)
    }
}

impl From<String> for HandlerId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Audit;

    fn audit_fn() {}

    fn id_of_val<T: 'static>(_: &T) -> HandlerId {
        HandlerId::of::<T>()
    }

    #[test]
    fn handler_id_from_type_name() {
        let id = HandlerId::of::<Audit>();
        assert!(id.as_str().ends_with("ids::tests::Audit"));
    }

    #[test]
    fn handler_id_of_fn_item_is_its_path() {
        let id = id_of_val(&audit_fn);
        assert!(id.as_str().ends_with("tests::audit_fn"));
    }

    #[test]
    fn closures_with_the_same_name_are_distinct() {
        let first = id_of_val(&|| 1);
        let second = id_of_val(&|| 2);
        assert_eq!(first.as_str(), second.as_str());
        assert_ne!(first, second);
    }

    #[test]
    fn explicit_ids_compare_by_value() {
        assert_eq!(HandlerId::from("recorder"), HandlerId::from("recorder".to_string()));
        assert_ne!(HandlerId::from("a"), HandlerId::from("b"));
    }

    #[test]
    fn bus_ids_are_unique_and_prefixed() {
        let a = BusId::generate();
        let b = BusId::generate();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("bus-"));
    }
}
