/// EIP-1559 (type 2) transaction encoding
use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{length_of_length, BufMut, Encodable, Header};

const EIP1559_TX_TYPE: u8 = 0x02;
// rlp([]) is the single byte 0xc0
const EMPTY_ACCESS_LIST_RLP_LEN: usize = 1;

#[derive(Clone, Debug)]
pub struct Eip1559Tx {
    pub chain_id: U256,
    pub nonce: U256,
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
    pub gas_limit: U256,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Eip1559Tx {
    fn fields_length(&self) -> usize {
        self.chain_id.length()
            + self.nonce.length()
            + self.max_priority_fee_per_gas.length()
            + self.max_fee_per_gas.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.data.length()
            + EMPTY_ACCESS_LIST_RLP_LEN
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.max_priority_fee_per_gas.encode(out);
        self.max_fee_per_gas.encode(out);
        self.gas_limit.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.data.encode(out);
        Header {
            list: true,
            payload_length: 0,
        }
        .encode(out);
    }

    /// Bytes that get hashed and signed: `0x02 || rlp(fields)`
    pub fn signing_payload(&self) -> Vec<u8> {
        typed(alloy_rlp::encode(self))
    }

    /// Raw signed transaction ready for `eth_sendRawTransaction`
    pub fn encode_signed(&self, y_parity: u8, r: U256, s: U256) -> Vec<u8> {
        typed(alloy_rlp::encode(SignedEip1559Tx {
            tx: self,
            y_parity,
            r,
            s,
        }))
    }
}

impl Encodable for Eip1559Tx {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.fields_length(),
        }
        .encode(out);
        self.encode_fields(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.fields_length();
        payload_length + length_of_length(payload_length)
    }
}

struct SignedEip1559Tx<'a> {
    tx: &'a Eip1559Tx,
    y_parity: u8,
    r: U256,
    s: U256,
}

impl SignedEip1559Tx<'_> {
    fn payload_length(&self) -> usize {
        self.tx.fields_length() + self.y_parity.length() + self.r.length() + self.s.length()
    }
}

impl Encodable for SignedEip1559Tx<'_> {
    fn encode(&self, out: &mut dyn BufMut) {
        Header {
            list: true,
            payload_length: self.payload_length(),
        }
        .encode(out);
        self.tx.encode_fields(out);
        self.y_parity.encode(out);
        self.r.encode(out);
        self.s.encode(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.payload_length();
        payload_length + length_of_length(payload_length)
    }
}

fn typed(payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(EIP1559_TX_TYPE);
    out.extend_from_slice(&payload);
    out
}
