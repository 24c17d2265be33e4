//! Fixture schemas shared by the integration tests.

use std::cell::Cell;
use std::rc::Rc;

use weft_core::AccessError;
use weft_engine::{Object, Schema, SlotSpec, Store, Value};

/// Untracked payload stored in `TestNode2::bar`.
#[derive(Clone, Debug, PartialEq)]
pub struct Bar {
    pub v: String,
}

impl Bar {
    pub fn new(name: &str) -> Self {
        Self {
            v: format!("X{name}X"),
        }
    }
}

/// A store plus one schema per fixture type.
///
/// | Schema | Slots |
/// |--------|-------|
/// | `TestNode` | `value = "v1"`, `node` (lazy `TestNode`), `node2` (nullable) |
/// | `SubTestNode` | extends `TestNode`: `value = "v2"`, `quantity = 42` |
/// | `SimpleNode` | `value: string`, `quantity: number`, `ready: boolean` |
/// | `AnyNode` | `foo` (opaque), `arr` (list) |
/// | `TestNode2` | initializers: `value`, `bar`, `quantity`, `count` (counter) |
/// | `TestNode3` | list initializers: `arr1 = [1, 2, 3]`, `arr2 = ["abc"]` |
/// | `Book` | `title`, `author`, `someFunc` (opaque) |
pub struct Fixtures {
    pub store: Store,
    pub test_node: Schema,
    pub sub_test_node: Schema,
    pub simple_node: Schema,
    pub any_node: Schema,
    pub test_node2: Schema,
    pub test_node3: Schema,
    pub book: Schema,
    counter: Rc<Cell<i64>>,
}

impl Fixtures {
    pub fn new() -> Self {
        let store = Store::new();
        let counter = Rc::new(Cell::new(0));

        let test_node = Schema::builder("TestNode")
            .slot("value", SlotSpec::string().default("v1"))
            .slot("node", SlotSpec::nested().lazy_self())
            .slot("node2", SlotSpec::nested().nullable())
            .build()
            .expect("TestNode");

        let sub_test_node = test_node
            .extend("SubTestNode")
            .slot("value", SlotSpec::string().default("v2"))
            .slot("quantity", SlotSpec::number().default(42))
            .build()
            .expect("SubTestNode");

        let simple_node = Schema::builder("SimpleNode")
            .slot("value", SlotSpec::string())
            .slot("quantity", SlotSpec::number())
            .slot("ready", SlotSpec::boolean())
            .build()
            .expect("SimpleNode");

        let any_node = Schema::builder("AnyNode")
            .slot("foo", SlotSpec::opaque())
            .slot("arr", SlotSpec::list())
            .build()
            .expect("AnyNode");

        let count = Rc::clone(&counter);
        let test_node2 = Schema::builder("TestNode2")
            .slot("value", SlotSpec::string())
            .slot("bar", SlotSpec::opaque())
            .slot("quantity", SlotSpec::number())
            .slot("count", SlotSpec::number())
            .init("value", |_| Ok(format!("v{}", 42)))
            .init("bar", |_| Ok(Value::opaque(Bar::new("the_bar"))))
            .init("quantity", |_| Ok(-1))
            .init("count", move |_| {
                let n = count.get();
                count.set(n + 1);
                Ok(n as f64)
            })
            .build()
            .expect("TestNode2");

        let test_node3 = Schema::builder("TestNode3")
            .slot("arr1", SlotSpec::list())
            .slot("arr2", SlotSpec::list())
            .init_list("arr1", |_| Ok([1, 2, 3]))
            .init_list("arr2", |_| Ok(["abc"]))
            .build()
            .expect("TestNode3");

        let book = Schema::builder("Book")
            .slot("title", SlotSpec::string())
            .slot("author", SlotSpec::string())
            .slot("someFunc", SlotSpec::opaque())
            .build()
            .expect("Book");

        Self {
            store,
            test_node,
            sub_test_node,
            simple_node,
            any_node,
            test_node2,
            test_node3,
            book,
            counter,
        }
    }

    /// Restart the `TestNode2::count` sequence at 0.
    pub fn reset_count(&self) {
        self.counter.set(0);
    }

    pub fn test_node(&self) -> Object {
        self.store.construct(&self.test_node).expect("TestNode")
    }

    pub fn sub_test_node(&self) -> Object {
        self.store.construct(&self.sub_test_node).expect("SubTestNode")
    }

    pub fn simple_node(&self) -> Object {
        self.store.construct(&self.simple_node).expect("SimpleNode")
    }

    pub fn any_node(&self) -> Object {
        self.store.construct(&self.any_node).expect("AnyNode")
    }

    pub fn test_node2(&self) -> Object {
        self.store.construct(&self.test_node2).expect("TestNode2")
    }

    pub fn test_node3(&self) -> Object {
        self.store.construct(&self.test_node3).expect("TestNode3")
    }

    pub fn book(&self) -> Object {
        self.store.construct(&self.book).expect("Book")
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::new()
    }
}

// ── Book accessors ─────────────────────────────────────────────────

/// `"<title> - <author>"`.
pub fn book_description(book: &Object) -> Result<String, AccessError> {
    let title = book.get("title")?;
    let author = book.get("author")?;
    Ok(format!(
        "{} - {}",
        title.as_str().unwrap_or_default(),
        author.as_str().unwrap_or_default()
    ))
}

/// Split `"<title> - <author>"` and write both slots. Input without
/// exactly one separator is ignored.
pub fn set_book_description(book: &Object, description: &str) -> Result<(), AccessError> {
    let parts: Vec<&str> = description.split('-').map(str::trim).collect();
    if let [title, author] = parts[..] {
        book.set("title", title)?;
        book.set("author", author)?;
    }
    Ok(())
}

pub fn is_author(book: &Object, author: &str) -> Result<bool, AccessError> {
    Ok(book.get("author")?.as_str() == Some(author))
}
