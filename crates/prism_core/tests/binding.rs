//! Bindings between dependency objects and view-models

use std::rc::Rc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use prism_core::{
    compile_event_binding, compile_getter, compile_setter, dependency_object_type, BindingError,
    BindingExpression, DelegateType, DependencyObject, Object, PropertyMetadata, PropertyRegistry,
    StaticView, TypeInfo, Value, View,
};

struct TextBox;

static TEXT_BOX_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
    TypeInfo::class::<TextBox>("TextBox")
        .base(dependency_object_type())
        .build()
});

struct Leaf {
    value: f32,
}

struct Branch {
    leaf: Arc<Leaf>,
}

struct Tree {
    branch: Mutex<Option<Arc<Branch>>>,
}

static LEAF_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
    TypeInfo::class::<Leaf>("Leaf")
        .readonly("C", |l: &Leaf| l.value)
        .build()
});

static BRANCH_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
    TypeInfo::class::<Branch>("Branch")
        .object("B", || &*LEAF_TYPE, |b: &Branch| Some(Arc::clone(&b.leaf)))
        .build()
});

static TREE_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
    TypeInfo::class::<Tree>("Tree")
        .object("A", || &*BRANCH_TYPE, |t: &Tree| t.branch.lock().unwrap().clone())
        .build()
});

struct Form {
    age: Mutex<String>,
    count: Mutex<i32>,
    price: Mutex<f64>,
    submitted: AtomicI32,
}

static FORM_TYPE: LazyLock<TypeInfo> = LazyLock::new(|| {
    TypeInfo::class::<Form>("Form")
        .property(
            "Age",
            |f: &Form| f.age.lock().unwrap().clone(),
            |f: &Form, v| *f.age.lock().unwrap() = v,
        )
        .property(
            "Count",
            |f: &Form| *f.count.lock().unwrap(),
            |f: &Form, v| *f.count.lock().unwrap() = v,
        )
        .property(
            "Price",
            |f: &Form| *f.price.lock().unwrap(),
            |f: &Form, v| *f.price.lock().unwrap() = v,
        )
        .method("Submit", 1, |f: &Form, args| {
            let n = args.first().and_then(Value::as_i32).unwrap_or(0);
            Value::Int32(f.submitted.fetch_add(n, Ordering::SeqCst) + n)
        })
        .build()
});

fn form() -> Arc<Form> {
    Arc::new(Form {
        age: Mutex::new(String::new()),
        count: Mutex::new(0),
        price: Mutex::new(0.0),
        submitted: AtomicI32::new(0),
    })
}

fn text_box(view_model: &Arc<Form>) -> Rc<DependencyObject> {
    let element = DependencyObject::new(&TEXT_BOX_TYPE).unwrap();
    let view: Arc<dyn View> = Arc::new(StaticView::new(view_model.clone()));
    element.set_view(Some(view));
    element
}

#[test]
fn test_safe_navigation_through_null() {
    let expression = BindingExpression::parse("{{A.B.C}}", true).unwrap();
    let getter = compile_getter::<f32>(&TREE_TYPE, &expression).unwrap();

    let empty = Arc::new(Tree {
        branch: Mutex::new(None),
    });
    let source: &Object = &*empty;
    assert_eq!(getter(source), 0.0);

    *empty.branch.lock().unwrap() = Some(Arc::new(Branch {
        leaf: Arc::new(Leaf { value: 4.5 }),
    }));
    assert_eq!(getter(source), 4.5);

    // Wrong root type reads as the default too
    let stranger = form();
    let source: &Object = &*stranger;
    assert_eq!(getter(source), 0.0);
}

#[test]
fn test_bound_property_with_null_path_reads_zero() {
    let registry = PropertyRegistry::new();
    let depth = registry
        .register_typed::<f32>("Depth", &TEXT_BOX_TYPE, PropertyMetadata::new().default_value(9.0f32))
        .unwrap();

    let tree: Arc<Tree> = Arc::new(Tree {
        branch: Mutex::new(None),
    });
    let element = DependencyObject::new(&TEXT_BOX_TYPE).unwrap();
    let view: Arc<dyn View> = Arc::new(StaticView::new(tree));
    element.set_view(Some(view));

    element.bind(&depth, &TREE_TYPE, "{{A.B.C}}").unwrap();
    element.digest(Duration::ZERO);
    assert_eq!(element.get_value(&depth), 0.0);
}

#[test]
fn test_sticky_string_from_source() {
    let registry = PropertyRegistry::new();
    let age = registry
        .register_typed::<i32>("Age", &TEXT_BOX_TYPE, PropertyMetadata::new())
        .unwrap();
    let view_model = form();
    let element = text_box(&view_model);
    element.bind(&age, &FORM_TYPE, "{{Age}}").unwrap();

    *view_model.age.lock().unwrap() = "abc".to_string();
    element.digest(Duration::ZERO);
    assert_eq!(element.get_value(&age), 0);
    assert_eq!(element.get_string(&age), "abc");

    // A successful write clears the sticky text
    element.set_value(&age, 42);
    assert_eq!(*view_model.age.lock().unwrap(), "42");
    assert_eq!(element.get_value(&age), 42);
    assert_eq!(element.get_string(&age), "42");
}

#[test]
fn test_sticky_string_round_trip() {
    let registry = PropertyRegistry::new();
    let text = registry
        .register_typed::<String>("Text", &TEXT_BOX_TYPE, PropertyMetadata::new())
        .unwrap();
    let view_model = form();
    let element = text_box(&view_model);
    element.bind(&text, &FORM_TYPE, "{{Count}}").unwrap();
    *view_model.count.lock().unwrap() = 7;
    element.digest(Duration::ZERO);
    assert_eq!(element.get_value(&text), "7");

    element.set_value(&text, "abc".to_string());
    assert_eq!(*view_model.count.lock().unwrap(), 0);
    assert_eq!(element.get_value(&text), "abc");
    assert_eq!(element.get_string(&text), "abc");

    // The source still holds what was written, so the text survives a digest
    element.digest(Duration::from_millis(16));
    assert_eq!(element.get_string(&text), "abc");

    // An external change replaces it
    *view_model.count.lock().unwrap() = 5;
    element.digest(Duration::from_millis(32));
    assert_eq!(element.get_value(&text), "5");
}

#[test]
fn test_format_specifier_on_bound_text() {
    let registry = PropertyRegistry::new();
    let text = registry
        .register_typed::<String>("PriceText", &TEXT_BOX_TYPE, PropertyMetadata::new())
        .unwrap();
    let view_model = form();
    *view_model.price.lock().unwrap() = 3.14159;
    let element = text_box(&view_model);

    element.bind(&text, &FORM_TYPE, "{{Price:.2}}").unwrap();
    element.digest(Duration::ZERO);
    assert_eq!(element.get_value(&text), "3.14");
}

#[test]
fn test_typed_setter_converts() {
    let expression = BindingExpression::parse("{{Count}}", true).unwrap();
    let setter = compile_setter::<f64>(&FORM_TYPE, &expression).unwrap();
    let view_model = form();
    let source: &Object = &*view_model;
    setter(source, 12.0);
    assert_eq!(*view_model.count.lock().unwrap(), 12);
}

#[test]
fn test_event_binding_through_element() {
    let view_model = form();
    let element = text_box(&view_model);
    let expression = BindingExpression::parse("{{Submit}}", true).unwrap();
    let clicked = DelegateType::new("Clicked", 1);

    let handler = compile_event_binding(&element, &clicked, &FORM_TYPE, &expression).unwrap();
    assert_eq!(handler(&[Value::Int32(2)]), Value::Int32(2));
    assert_eq!(handler(&[Value::Int32(3)]), Value::Int32(5));
    assert_eq!(handler(&[]), Value::Null);

    let no_args = DelegateType::new("Loaded", 0);
    assert!(matches!(
        compile_event_binding(&element, &no_args, &FORM_TYPE, &expression),
        Err(BindingError::MethodNotFound { arity: 0, .. })
    ));
}
