//! MessageTypeKey - 具体型から作る routing key

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 登録と dispatch の両方で使う routing key
///
/// 等価比較と hash は `TypeId` のみ。表示名が同じ別の型は衝突しない。
/// `name` はモジュールパス + 型名で、ログとエラーメッセージ用。
#[derive(Clone, Copy)]
pub struct MessageTypeKey {
    id: TypeId,
    name: &'static str,
}

impl MessageTypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MessageTypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MessageTypeKey {}

impl Hash for MessageTypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for MessageTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageTypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for MessageTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
