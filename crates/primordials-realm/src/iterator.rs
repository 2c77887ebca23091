//! Internal state of the built-in iterator objects and the iterator protocol
//! helpers used by native code.

use std::sync::Arc;

use crate::error::{VmError, VmResult};
use crate::object::JsObject;
use crate::realm::Realm;
use crate::value::Value;

/// What a collection iterator yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationKind {
    Keys,
    Values,
    Entries,
}

/// `%ArrayIterator%` slots. `iterated` becomes `None` once exhausted.
pub struct ArrayIteratorState {
    pub iterated: Option<Value>,
    pub index: usize,
    pub kind: IterationKind,
}

/// `%MapIterator%` / `%SetIterator%` slots
pub struct MapIteratorState {
    pub iterated: Option<Arc<JsObject>>,
    pub position: usize,
    pub kind: IterationKind,
}

/// `%StringIterator%` slots; `position` is a UTF-16 index
pub struct StringIteratorState {
    pub units: Option<Vec<u16>>,
    pub position: usize,
}

/// `%RegExpStringIterator%` slots
pub struct RegExpStringIteratorState {
    pub matcher: Value,
    pub string: Arc<str>,
    pub global: bool,
    pub full_unicode: bool,
    pub done: bool,
}

/// Iterator Record
#[derive(Clone, Debug)]
pub struct IteratorRecord {
    pub iterator: Value,
    pub next_method: Value,
    pub done: bool,
}

impl Realm {
    /// GetIterator(obj, sync)
    pub fn get_iterator(&self, iterable: &Value) -> VmResult<IteratorRecord> {
        let symbol = self.intrinsics().symbols.iterator.clone();
        let method = self.get_method(iterable, &symbol)?.ok_or_else(|| {
            VmError::type_error(format!("{} is not iterable", self.describe(iterable)))
        })?;
        self.get_iterator_from_method(iterable, &method)
    }

    /// GetIteratorFromMethod
    pub fn get_iterator_from_method(
        &self,
        iterable: &Value,
        method: &Value,
    ) -> VmResult<IteratorRecord> {
        let iterator = self.call(method, iterable, &[])?;
        if !iterator.is_object() {
            return Err(VmError::type_error("Result of the Symbol.iterator method is not an object"));
        }
        let next_method = self.get(&iterator, "next")?;
        Ok(IteratorRecord {
            iterator,
            next_method,
            done: false,
        })
    }

    /// IteratorStepValue: `None` when the iterator is done
    pub fn iterator_step_value(&self, record: &mut IteratorRecord) -> VmResult<Option<Value>> {
        if record.done {
            return Ok(None);
        }
        let result = match self.call(&record.next_method, &record.iterator, &[]) {
            Ok(result) => result,
            Err(e) => {
                record.done = true;
                return Err(e);
            }
        };
        if !result.is_object() {
            record.done = true;
            return Err(VmError::type_error(format!(
                "Iterator result {} is not an object",
                self.describe(&result)
            )));
        }
        let done = self.get(&result, "done")?.to_boolean();
        if done {
            record.done = true;
            return Ok(None);
        }
        self.get(&result, "value").map(Some)
    }

    /// IteratorClose for a normal completion
    pub fn iterator_close(&self, record: &IteratorRecord) -> VmResult<()> {
        let ret = self.get_method(&record.iterator, "return")?;
        if let Some(ret) = ret {
            let result = self.call(&ret, &record.iterator, &[])?;
            if !result.is_object() {
                return Err(VmError::type_error("Iterator result is not an object"));
            }
        }
        Ok(())
    }

    /// IteratorToList over `GetIterator(iterable)`
    pub fn iterable_to_list(&self, iterable: &Value) -> VmResult<Vec<Value>> {
        let mut record = self.get_iterator(iterable)?;
        let mut values = Vec::new();
        while let Some(value) = self.iterator_step_value(&mut record)? {
            values.push(value);
        }
        Ok(values)
    }

    /// CreateIterResultObject
    pub fn create_iter_result(&self, value: Value, done: bool) -> Value {
        let obj = self.new_object();
        self.create_data_property(&obj, "value", value);
        self.create_data_property(&obj, "done", Value::boolean(done));
        Value::object(obj)
    }
}
