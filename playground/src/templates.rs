//! Ready made locking/unlocking script pairs.

use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Basic,
    Arithmetic,
    Stack,
    Conditionals,
    Splice,
    Hashing,
    Signatures,
    TimeLocks,
    Puzzles,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Basic,
        Category::Arithmetic,
        Category::Stack,
        Category::Conditionals,
        Category::Splice,
        Category::Hashing,
        Category::Signatures,
        Category::TimeLocks,
        Category::Puzzles,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Basic => "Basic",
            Category::Arithmetic => "Arithmetic",
            Category::Stack => "Stack",
            Category::Conditionals => "Conditionals",
            Category::Splice => "Splice",
            Category::Hashing => "Hashing",
            Category::Signatures => "Signatures",
            Category::TimeLocks => "Time locks",
            Category::Puzzles => "Puzzles",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: &'static str,
    pub category: Category,
    pub locking_asm: &'static str,
    /// May hold `<sig>` and `<pubkey>` placeholders, filled in when building a spend
    pub unlocking_asm: &'static str,
    pub notes: &'static str,
    /// Checks signatures, so it only validates against a real spending transaction
    pub needs_real_context: bool,
    /// Shows a construct without satisfying the clean stack rule
    pub illustrative: bool,
}

const fn template(
    name: &'static str,
    category: Category,
    locking_asm: &'static str,
    unlocking_asm: &'static str,
    notes: &'static str,
) -> Template {
    Template { name, category, locking_asm, unlocking_asm, notes, needs_real_context: false, illustrative: false }
}

const fn with_real_context(template: Template) -> Template {
    Template { needs_real_context: true, ..template }
}

const fn illustrative(template: Template) -> Template {
    Template { illustrative: true, ..template }
}

pub static TEMPLATES: &[Template] = &[
    template("Always true", Category::Basic, "OP_1", "", "Anyone can spend. The lock alone leaves a single true value."),
    template("Equality", Category::Basic, "OP_EQUAL", "OP_5 OP_5", "Two equal values collapse into a true result."),
    illustrative(template(
        "Provably unspendable",
        Category::Basic,
        "OP_RETURN 68656c6c6f",
        "",
        "Carries data. OP_RETURN ends execution with an error, so no unlock can ever succeed.",
    )),
    template("Addition puzzle", Category::Arithmetic, "OP_ADD OP_5 OP_EQUAL", "OP_2 OP_3", "Any two numbers that add up to 5."),
    template("Multiplication", Category::Arithmetic, "OP_MUL OP_12 OP_EQUAL", "OP_3 OP_4", "Two factors of 12."),
    template(
        "Range check",
        Category::Arithmetic,
        "OP_DUP OP_1 OP_11 OP_WITHIN OP_VERIFY OP_7 OP_NUMEQUAL",
        "OP_7",
        "OP_WITHIN tests min <= x < max before the value itself is compared.",
    ),
    template(
        "Quotient and remainder",
        Category::Arithmetic,
        "OP_2DUP OP_DIV OP_3 OP_NUMEQUALVERIFY OP_MOD OP_2 OP_NUMEQUAL",
        "OP_14 OP_4",
        "14 / 4 is 3 remainder 2.",
    ),
    template("Swap and subtract", Category::Stack, "OP_SWAP OP_SUB OP_3 OP_EQUAL", "OP_2 OP_5", "OP_SUB takes the top item from the one below it."),
    template(
        "Alt stack round trip",
        Category::Stack,
        "OP_TOALTSTACK OP_DUP OP_FROMALTSTACK OP_ADD OP_ADD OP_9 OP_EQUAL",
        "OP_3 OP_3",
        "Parks a value on the alt stack while the main stack is rearranged.",
    ),
    template("Depth check", Category::Stack, "OP_DEPTH OP_3 OP_EQUALVERIFY OP_2DROP", "OP_1 OP_2 OP_3", "Requires exactly three unlocking items."),
    illustrative(template(
        "Leftover byproduct",
        Category::Stack,
        "OP_DUP OP_ADD OP_8 OP_EQUAL",
        "OP_4 OP_4",
        "The comparison succeeds but the first 4 stays on the stack. Won't validate in the playground: clean stack rule.",
    )),
    template(
        "If/else branch",
        Category::Conditionals,
        "OP_IF OP_2 OP_ELSE OP_3 OP_ENDIF OP_3 OP_EQUAL",
        "OP_0",
        "A false condition selects the OP_ELSE branch. Skipped opcodes still show up in the trace.",
    ),
    template("Negated guard", Category::Conditionals, "OP_NOTIF OP_1 OP_ELSE OP_0 OP_ENDIF", "OP_0", "OP_NOTIF runs its body when the condition is false."),
    template(
        "Secret or number",
        Category::Conditionals,
        "OP_IF OP_SHA256 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824 OP_EQUAL OP_ELSE OP_5 OP_EQUAL OP_ENDIF",
        "68656c6c6f OP_1",
        "Two ways to spend: the preimage of the digest with OP_1, or the number 5 with OP_0.",
    ),
    template("Concatenation", Category::Splice, "OP_CAT 68656c6c6f OP_EQUAL", "6865 6c6c6f", "OP_CAT joins the two top items."),
    template("Split", Category::Splice, "OP_3 OP_SPLIT OP_DROP 68656c OP_EQUAL", "68656c6c6f", "Keeps the first three bytes of the unlocking data."),
    template(
        "Size check",
        Category::Splice,
        "OP_SIZE OP_5 OP_EQUALVERIFY 68656c6c6f OP_EQUAL",
        "68656c6c6f",
        "OP_SIZE pushes the length without consuming the item.",
    ),
    template(
        "SHA-256 preimage",
        Category::Hashing,
        "OP_SHA256 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824 OP_EQUAL",
        "68656c6c6f",
        "Hash puzzle on the text \"hello\". Anyone who sees the unlock can reuse it.",
    ),
    template(
        "HASH160 preimage",
        Category::Hashing,
        "OP_HASH160 b6a9c8c230722b7c748331a8b450f05566dc7d0f OP_EQUAL",
        "68656c6c6f",
        "RIPEMD-160 of SHA-256, the hash used by addresses.",
    ),
    template(
        "HASH256 preimage",
        Category::Hashing,
        "OP_HASH256 9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50 OP_EQUAL",
        "68656c6c6f",
        "Double SHA-256, the hash used for transaction ids.",
    ),
    illustrative(template(
        "Hash with leftover",
        Category::Hashing,
        "OP_DUP OP_SHA256 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824 OP_EQUAL",
        "68656c6c6f",
        "The preimage is duplicated and never dropped. Won't validate in the playground: clean stack rule.",
    )),
    with_real_context(template(
        "Pay to public key hash",
        Category::Signatures,
        "OP_DUP OP_HASH160 751e76e8199196d454941c45d1b3a323f1433bd6 OP_EQUALVERIFY OP_CHECKSIG",
        "<sig> <pubkey>",
        "The standard output type. The hash here belongs to private key 1, replace it with your own.",
    )),
    with_real_context(template(
        "Pay to public key",
        Category::Signatures,
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798 OP_CHECKSIG",
        "<sig>",
        "The public key is stored in the lock, so the unlock is a bare signature.",
    )),
    with_real_context(template(
        "1-of-2 multisig",
        Category::Signatures,
        "OP_1 0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798 02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5 OP_2 OP_CHECKMULTISIG",
        "OP_0 <sig>",
        "OP_CHECKMULTISIG pops one item too many, hence the leading OP_0.",
    )),
    template(
        "Absolute time lock",
        Category::TimeLocks,
        "0065cd1d OP_CHECKLOCKTIMEVERIFY OP_DROP OP_1",
        "",
        "OP_CHECKLOCKTIMEVERIFY is a no-op now. The lock time is enforced by the spending transaction: unlock with a lock time.",
    ),
    template(
        "Relative time lock",
        Category::TimeLocks,
        "OP_10 OP_CHECKSEQUENCEVERIFY OP_DROP OP_1",
        "",
        "OP_CHECKSEQUENCEVERIFY is a no-op now. The script only documents the intended delay.",
    ),
    with_real_context(template(
        "Time locked key",
        Category::TimeLocks,
        "0065cd1d OP_CHECKLOCKTIMEVERIFY OP_DROP OP_DUP OP_HASH160 751e76e8199196d454941c45d1b3a323f1433bd6 OP_EQUALVERIFY OP_CHECKSIG",
        "<sig> <pubkey>",
        "Pay to public key hash behind a lock time.",
    )),
    with_real_context(template(
        "R-puzzle",
        Category::Puzzles,
        "OP_OVER OP_3 OP_SPLIT OP_NIP OP_1 OP_SPLIT OP_SWAP OP_SPLIT OP_DROP 79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798 OP_EQUALVERIFY OP_CHECKSIG",
        "<sig> <pubkey>",
        "Any key can spend with a signature made using the committed nonce. This R belongs to nonce 1, generate your own.",
    )),
    with_real_context(template(
        "Hash puzzle with key",
        Category::Puzzles,
        "OP_SHA256 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824 OP_EQUALVERIFY OP_DUP OP_HASH160 751e76e8199196d454941c45d1b3a323f1433bd6 OP_EQUALVERIFY OP_CHECKSIG",
        "<sig> <pubkey> 68656c6c6f",
        "Needs both the preimage and a signature, so a seen preimage cannot be stolen.",
    )),
];

pub fn find(name: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|template| template.name.eq_ignore_ascii_case(name))
}

pub fn by_category(category: Category) -> impl Iterator<Item = &'static Template> {
    TEMPLATES.iter().filter(move |template| template.category == category)
}
