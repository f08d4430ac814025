use indexmap::IndexMap;

use crate::{ScalarKind, TypeDef, TypeError, TypeId, TypeTable};

fn fields(entries: &[(&str, TypeId)]) -> IndexMap<String, TypeId> {
    entries.iter().map(|(n, t)| (n.to_string(), *t)).collect()
}

#[test]
fn scalar_codes_are_stable() {
    for kind in ScalarKind::ALL {
        assert_eq!(ScalarKind::from_code(kind.code()), Some(kind));
    }
    assert_eq!(ScalarKind::from_code(11), None);
    assert_eq!(ScalarKind::I64.code(), 7);
}

#[test]
fn scalar_sizes_match_host() {
    assert_eq!(ScalarKind::U8.size(), 1);
    assert_eq!(ScalarKind::I16.size(), 2);
    assert_eq!(ScalarKind::F32.size(), 4);
    assert_eq!(ScalarKind::U64.size(), 8);
    assert_eq!(ScalarKind::I64.align(), align_of::<i64>());
    assert_eq!(ScalarKind::F64.align(), align_of::<f64>());
}

#[test]
fn scalar_and_pointer_are_deduplicated() {
    let mut types = TypeTable::new();
    let a = types.scalar(ScalarKind::I32);
    let b = types.scalar(ScalarKind::I32);
    assert_eq!(a, b);

    let p = types.pointer_to(a);
    assert_eq!(types.pointer_to(a), p);
    assert_eq!(types.len(), 2);
}

#[test]
fn display_names() {
    let mut types = TypeTable::new();
    let i32_ty = types.scalar(ScalarKind::I32);
    let point = types.add(TypeDef::Struct {
        name: "Point".into(),
        fields: fields(&[("x", i32_ty), ("y", i32_ty)]),
    });
    let ptr = types.pointer_to(point);
    let cb = types.add(TypeDef::Proc {
        params: vec![i32_ty],
        ret: Some(i32_ty),
        closure: false,
    });

    assert_eq!(types.display_name(i32_ty), "i32");
    assert_eq!(types.display_name(point), "Point");
    assert_eq!(types.display_name(ptr), "Point*");
    assert_eq!(types.display_name(cb), "Proc(i32 -> i32)");
    assert_eq!(types.display_name(TypeId(99)), "T99");
}

#[test]
fn field_lookup_by_index() {
    let mut types = TypeTable::new();
    let u8_ty = types.scalar(ScalarKind::U8);
    let i64_ty = types.scalar(ScalarKind::I64);
    let s = types.add(TypeDef::Struct {
        name: "S".into(),
        fields: fields(&[("tag", u8_ty), ("value", i64_ty)]),
    });

    assert_eq!(types.field(s, 1).unwrap(), ("value", i64_ty));
    assert_eq!(
        types.field(s, 2),
        Err(TypeError::UnknownField { ty: s, field: 2 })
    );
    assert_eq!(types.field(u8_ty, 0), Err(TypeError::NotAggregate(u8_ty)));
    assert_eq!(types.by_name("S"), Some(s));
    assert_eq!(types.by_name("Missing"), None);
}

#[test]
fn validate_rejects_by_value_recursion() {
    let mut types = TypeTable::new();
    let i32_ty = types.scalar(ScalarKind::I32);
    // Node { next: Node } refers to id 1, itself
    types.add(TypeDef::Struct {
        name: "Node".into(),
        fields: fields(&[("value", i32_ty), ("next", TypeId(1))]),
    });

    assert_eq!(
        types.validate(),
        Err(TypeError::RecursiveAggregate("Node".into()))
    );
}

#[test]
fn validate_accepts_recursion_through_pointer() {
    let mut types = TypeTable::new();
    let i32_ty = types.scalar(ScalarKind::I32);
    // Node { value, next: Node* }: the pointer is id 2
    types.add(TypeDef::Struct {
        name: "Node".into(),
        fields: fields(&[("value", i32_ty), ("next", TypeId(2))]),
    });
    types.add(TypeDef::Pointer { pointee: TypeId(1) });

    assert_eq!(types.validate(), Ok(()));
}

#[test]
fn validate_rejects_unknown_and_empty() {
    let mut types = TypeTable::new();
    types.add(TypeDef::Pointer { pointee: TypeId(7) });
    assert_eq!(types.validate(), Err(TypeError::UnknownType(TypeId(7))));

    let mut types = TypeTable::new();
    types.add(TypeDef::Union {
        name: "Empty".into(),
        fields: IndexMap::new(),
    });
    assert_eq!(
        types.validate(),
        Err(TypeError::EmptyAggregate("Empty".into()))
    );
}

#[test]
fn table_serializes_as_json() {
    let mut types = TypeTable::new();
    let u8_ty = types.scalar(ScalarKind::U8);
    types.add(TypeDef::Union {
        name: "U".into(),
        fields: fields(&[("b", u8_ty)]),
    });

    let json = serde_json::to_string(&types).unwrap();
    let back: TypeTable = serde_json::from_str(&json).unwrap();
    assert_eq!(back, types);
}
