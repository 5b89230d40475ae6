use std::collections::{hash_map, HashMap};

use serde::de::{self, IntoDeserializer};

use super::FormError;

/// One node of a parsed form: a string leaf, an array, or a map.
///
/// Every leaf is a string; type coercion happens at deserialization time,
/// so `"21"` can decode into an integer field and `"yes"` into a bool.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Str(String),
    Arr(Vec<FormValue>),
    Map(HashMap<String, FormValue>),
}

#[derive(Clone, Copy)]
pub(crate) struct FormDeserializer<'de> {
    value: &'de FormValue,
}

impl<'de> FormDeserializer<'de> {
    pub(crate) fn new(value: &'de FormValue) -> Self {
        Self { value }
    }

    fn unexpected(&self) -> de::Unexpected<'_> {
        match self.value {
            FormValue::Str(text) => de::Unexpected::Str(text),
            FormValue::Arr(_) => de::Unexpected::Seq,
            FormValue::Map(_) => de::Unexpected::Map,
        }
    }

    fn invalid(&self, expected: &dyn de::Expected) -> FormError {
        de::Error::invalid_type(self.unexpected(), expected)
    }
}

fn bool_token(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "y" => Some(true),
        "false" | "no" | "0" | "n" => Some(false),
        _ => None,
    }
}

macro_rules! deserialize_parsed {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V>(self, visitor: V) -> Result<V::Value, FormError>
        where
            V: de::Visitor<'de>,
        {
            match self.value {
                FormValue::Str(text) => match text.parse::<$ty>() {
                    Ok(parsed) => visitor.$visit(parsed),
                    Err(_) => Err(de::Error::invalid_value(
                        de::Unexpected::Str(text),
                        &visitor,
                    )),
                },
                _ => Err(self.invalid(&visitor)),
            }
        }
    };
}

impl<'de> de::Deserializer<'de> for FormDeserializer<'de> {
    type Error = FormError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            FormValue::Str(text) => visitor.visit_borrowed_str(text),
            FormValue::Arr(_) => self.deserialize_seq(visitor),
            FormValue::Map(_) => self.deserialize_map(visitor),
        }
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            FormValue::Str(text) => match bool_token(text) {
                Some(value) => visitor.visit_bool(value),
                None => Err(de::Error::invalid_value(
                    de::Unexpected::Str(text),
                    &visitor,
                )),
            },
            _ => Err(self.invalid(&visitor)),
        }
    }

    deserialize_parsed!(deserialize_i8, visit_i8, i8);
    deserialize_parsed!(deserialize_i16, visit_i16, i16);
    deserialize_parsed!(deserialize_i32, visit_i32, i32);
    deserialize_parsed!(deserialize_i64, visit_i64, i64);
    deserialize_parsed!(deserialize_u8, visit_u8, u8);
    deserialize_parsed!(deserialize_u16, visit_u16, u16);
    deserialize_parsed!(deserialize_u32, visit_u32, u32);
    deserialize_parsed!(deserialize_u64, visit_u64, u64);
    deserialize_parsed!(deserialize_f32, visit_f32, f32);
    deserialize_parsed!(deserialize_f64, visit_f64, f64);

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            FormValue::Str(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(only), None) => visitor.visit_char(only),
                    _ => Err(de::Error::invalid_value(
                        de::Unexpected::Str(text),
                        &visitor,
                    )),
                }
            }
            _ => Err(self.invalid(&visitor)),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            FormValue::Str(text) => visitor.visit_borrowed_str(text),
            _ => Err(self.invalid(&visitor)),
        }
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        Err(self.invalid(&visitor))
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        Err(self.invalid(&visitor))
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_some(self)
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    // A non-array node decodes as an empty sequence rather than an error,
    // so optional list fields tolerate a stray scalar under the same key.
    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        let items: &[FormValue] = match self.value {
            FormValue::Arr(items) => items,
            _ => &[],
        };
        visitor.visit_seq(FormSeqAccess { items, index: 0 })
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            FormValue::Map(map) => visitor.visit_map(FormMapAccess {
                iter: map.iter(),
                pending: None,
            }),
            _ => Err(self.invalid(&visitor)),
        }
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            FormValue::Str(text) => visitor.visit_enum(text.as_str().into_deserializer()),
            _ => Err(self.invalid(&visitor)),
        }
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, FormError>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_any(visitor)
    }
}

struct FormSeqAccess<'de> {
    items: &'de [FormValue],
    index: usize,
}

impl<'de> de::SeqAccess<'de> for FormSeqAccess<'de> {
    type Error = FormError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, FormError>
    where
        T: de::DeserializeSeed<'de>,
    {
        match self.items.get(self.index) {
            Some(value) => {
                self.index += 1;
                seed.deserialize(FormDeserializer::new(value)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len() - self.index)
    }
}

struct FormMapAccess<'de> {
    iter: hash_map::Iter<'de, String, FormValue>,
    pending: Option<&'de FormValue>,
}

impl<'de> de::MapAccess<'de> for FormMapAccess<'de> {
    type Error = FormError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, FormError>
    where
        K: de::DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(key.as_str().into_deserializer()).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, FormError>
    where
        V: de::DeserializeSeed<'de>,
    {
        match self.pending.take() {
            Some(value) => seed.deserialize(FormDeserializer::new(value)),
            None => Err(de::Error::custom("value requested before key")),
        }
    }
}

impl de::Error for FormError {
    fn custom<T: std::fmt::Display>(message: T) -> Self {
        Self::Decode {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::form::FormDecoder;
    use serde::Deserialize;

    #[test]
    fn scalars_coerce_from_string_leaves() {
        #[derive(Deserialize)]
        struct Profile {
            name: String,
            age: u8,
            score: f64,
            active: bool,
        }

        let profile: Profile = FormDecoder::new()
            .decode("name=John&age=21&score=9.5&active=yes")
            .unwrap();
        assert_eq!(profile.name, "John");
        assert_eq!(profile.age, 21);
        assert_eq!(profile.score, 9.5);
        assert!(profile.active);
    }

    #[test]
    fn bool_accepts_the_whole_token_set() {
        #[derive(Deserialize)]
        struct Flags {
            a: bool,
            b: bool,
            c: bool,
            d: bool,
        }

        let flags: Flags = FormDecoder::new().decode("a=Y&b=0&c=TRUE&d=no").unwrap();
        assert!(flags.a);
        assert!(!flags.b);
        assert!(flags.c);
        assert!(!flags.d);
    }

    #[test]
    fn flag_keys_decode_as_true() {
        #[derive(Deserialize)]
        struct Options {
            verbose: bool,
        }

        let options: Options = FormDecoder::new().decode("verbose").unwrap();
        assert!(options.verbose);
    }

    #[test]
    fn arrays_collect_from_empty_brackets() {
        #[derive(Deserialize)]
        struct Post {
            tag: Vec<String>,
        }

        let post: Post = FormDecoder::new().decode("tag[]=http&tag[]=server").unwrap();
        assert_eq!(post.tag, vec!["http", "server"]);
    }

    #[test]
    fn nested_maps_decode_into_nested_structs() {
        #[derive(Deserialize)]
        struct Address {
            city: String,
            zip: u32,
        }

        #[derive(Deserialize)]
        struct User {
            name: String,
            address: Address,
        }

        let user: User = FormDecoder::new()
            .decode("name=John&address[city]=Oslo&address[zip]=1234")
            .unwrap();
        assert_eq!(user.name, "John");
        assert_eq!(user.address.city, "Oslo");
        assert_eq!(user.address.zip, 1234);
    }

    #[test]
    fn unit_enums_decode_from_their_variant_name() {
        #[derive(Deserialize, Debug, PartialEq)]
        #[serde(rename_all = "lowercase")]
        enum Sort {
            Asc,
            Desc,
        }

        #[derive(Deserialize)]
        struct Query {
            sort: Sort,
        }

        let query: Query = FormDecoder::new().decode("sort=desc").unwrap();
        assert_eq!(query.sort, Sort::Desc);
    }

    #[test]
    fn missing_optional_fields_default_to_none() {
        #[derive(Deserialize)]
        struct Search {
            q: String,
            page: Option<u32>,
        }

        let search: Search = FormDecoder::new().decode("q=rust").unwrap();
        assert_eq!(search.q, "rust");
        assert_eq!(search.page, None);
    }

    #[test]
    fn unparsable_number_is_an_error() {
        #[derive(Deserialize)]
        struct Search {
            #[allow(dead_code)]
            page: u32,
        }

        let result: Result<Search, _> = FormDecoder::new().decode("page=banana");
        assert!(result.is_err());
    }

    #[test]
    fn omit_options_flow_through_the_decoder() {
        #[derive(Deserialize)]
        struct Sparse {
            name: String,
            age: Option<String>,
        }

        let decoder = FormDecoder {
            omit_empty_values: true,
            omit_flags: true,
        };
        let sparse: Sparse = decoder.decode("name=John&age=&isAdmin").unwrap();
        assert_eq!(sparse.name, "John");
        assert_eq!(sparse.age, None);
    }
}
